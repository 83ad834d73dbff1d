//! TravelSafe core library.
//!
//! This crate provides the foundational components for tourist account
//! provisioning: configuration, the domain model, credential derivation,
//! the record store and identity service seams with their hosted-backend
//! clients, and the provisioner itself.

pub mod backend;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod identity;
pub mod models;
pub mod provisioner;
pub mod store;

// Re-exports for convenience.
pub use backend::BackendClient;
pub use config::AppConfig;
pub use identity::IdentityService;
pub use provisioner::Provisioner;
pub use store::TouristStore;
