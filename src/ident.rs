//! Identity and lookup-key normalization utilities
//! ------------------------------------------------
//! Single source of truth for normalizing identity emails and deriving the
//! vehicle lookup key from a vehicle number.

/// Normalize an identity email for storage and comparison: trim surrounding
/// whitespace and lowercase. Every ownership check in the crate compares
/// emails in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Display name fallback when the identity provider supplies none: the local
/// part of the email.
pub fn username_from_email(email: &str) -> String {
    let e = normalize_email(email);
    e.split('@').next().unwrap_or(&e).to_string()
}

/// Derive the URL-safe vehicle key from a registration plate number.
/// Whitespace runs collapse to a single hyphen, the rest is lowercased:
/// "BA 2 PA 4567" -> "ba-2-pa-4567". Must be recomputed whenever the vehicle
/// number changes so the two stay in sync.
pub fn vehicle_key(vehicle_number: &str) -> String {
    vehicle_number
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_ascii_lowercase()
}
