//! Label grammar checks
//!
//! Main-zone hostnames are 4–32 lowercase alphanumerics, sub-zone labels
//! 3–32. Nothing else (no hyphens, no uppercase, no dots) is accepted.

use crate::error::{Error, Result};

const HOSTNAME_MIN: usize = 4;
const SUB_HOSTNAME_MIN: usize = 3;
const LABEL_MAX: usize = 32;

fn is_label(label: &str, min: usize) -> bool {
    (min..=LABEL_MAX).contains(&label.len())
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Check a main-zone hostname against the grammar
pub fn is_valid_hostname(hostname: &str) -> bool {
    is_label(hostname, HOSTNAME_MIN)
}

/// Check a sub-zone label against the grammar
pub fn is_valid_sub_hostname(label: &str) -> bool {
    is_label(label, SUB_HOSTNAME_MIN)
}

/// Validate a hostname and check it against the deny-list
pub fn check_hostname(hostname: &str, blacklist: &[String]) -> Result<()> {
    if hostname.is_empty() {
        return Err(Error::bad_input("hostname is empty"));
    }
    // Deny-list first: listed names need not satisfy the grammar
    if blacklist.iter().any(|b| b == hostname) {
        return Err(Error::Blacklisted(hostname.to_string()));
    }
    if !is_valid_hostname(hostname) {
        return Err(Error::InvalidHostname(hostname.to_string()));
    }
    Ok(())
}
