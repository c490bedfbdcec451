use serde::{Deserialize, Serialize};

/// Authenticated caller identity. The email is normalized (trimmed,
/// lowercased) at construction; every ownership comparison in the crate runs
/// against this form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub username: String,
}

impl Principal {
    pub fn new(email: &str, name: Option<&str>) -> Self {
        let email = crate::ident::normalize_email(email);
        let username = match name {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => crate::ident::username_from_email(&email),
        };
        Self { email, username }
    }
}
