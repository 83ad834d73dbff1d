//! Deterministic credential derivation for tourist records.

use crate::config::CredentialPolicy;
use crate::models::{Credential, TouristRecord};

/// Derive the login credential for one record.
pub fn derive(record: &TouristRecord, policy: &CredentialPolicy) -> Credential {
    Credential {
        tourist_id: record.tourist_id.clone(),
        name: record.name.clone(),
        email: derive_email(&record.name, &policy.email_domain),
        password: derive_password(&record.citizenship, &policy.password_suffix),
    }
}

/// Derive credentials for every record, preserving order.
pub fn derive_all(records: &[TouristRecord], policy: &CredentialPolicy) -> Vec<Credential> {
    records.iter().map(|r| derive(r, policy)).collect()
}

/// Lowercase the name and replace each whitespace run with a single `.`.
///
/// Runs at either end are replaced too, so `" Ana"` becomes `.ana`.
pub fn derive_email(name: &str, domain: &str) -> String {
    // Lowercase the whole name first so context-dependent mappings such as
    // the Greek final sigma apply.
    let lowered = name.to_lowercase();
    let mut local = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                local.push('.');
                in_space = true;
            }
        } else {
            local.push(c);
            in_space = false;
        }
    }
    format!("{}@{}", local, domain)
}

pub fn derive_password(citizenship: &str, suffix: &str) -> String {
    format!("{}{}", citizenship, suffix)
}
