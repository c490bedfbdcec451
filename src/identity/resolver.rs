//! Session resolution from request headers. Token issuance belongs to the
//! external identity provider; this side only verifies and extracts the
//! identity, so the trait surface is a single lookup.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::principal::Principal;

/// Claims the identity provider signs into the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exp: usize,
}

pub trait SessionResolver: Send + Sync {
    /// Extract the authenticated identity from a request, if any. Absent or
    /// invalid tokens resolve to `None`; the resolver never errors.
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// HS256 verification against the shared session secret. The token is read
/// from the configured session cookie, falling back to a bearer header.
pub struct JwtSessionResolver {
    key: DecodingKey,
    cookie_name: String,
}

impl JwtSessionResolver {
    pub fn new(secret: &str, cookie_name: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            cookie_name: cookie_name.to_string(),
        }
    }

    fn token_from(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(tok) = parse_cookie(headers, &self.cookie_name) {
            return Some(tok);
        }
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.to_string())
    }
}

impl SessionResolver for JwtSessionResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = self.token_from(headers)?;
        let validation = Validation::new(Algorithm::HS256);
        match decode::<SessionClaims>(&token, &self.key, &validation) {
            Ok(data) => Some(Principal::new(&data.claims.email, data.claims.name.as_deref())),
            Err(e) => {
                debug!("session token rejected: {e}");
                None
            }
        }
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";
    const COOKIE: &str = "session-token";

    fn sign(claims: &SessionClaims, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims(email: &str, exp_offset_secs: i64) -> SessionClaims {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        SessionClaims {
            email: email.into(),
            name: Some("Ram Thapa".into()),
            exp: (now + exp_offset_secs) as usize,
        }
    }

    fn header_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", format!("{COOKIE}={value}; other=1").parse().unwrap());
        headers
    }

    #[test]
    fn resolves_valid_cookie_token() {
        let resolver = JwtSessionResolver::new(SECRET, COOKIE);
        let token = sign(&claims(" Ram@Gmail.com ", 3600), SECRET);
        let p = resolver.resolve(&header_with_cookie(&token)).unwrap();
        assert_eq!(p.email, "ram@gmail.com");
        assert_eq!(p.username, "Ram Thapa");
    }

    #[test]
    fn resolves_bearer_header() {
        let resolver = JwtSessionResolver::new(SECRET, COOKIE);
        let token = sign(&claims("sita@gmail.com", 3600), SECRET);
        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {token}").parse().unwrap());
        assert!(resolver.resolve(&headers).is_some());
    }

    #[test]
    fn rejects_wrong_secret_and_expired() {
        let resolver = JwtSessionResolver::new(SECRET, COOKIE);
        let forged = sign(&claims("ram@gmail.com", 3600), "other-secret");
        assert!(resolver.resolve(&header_with_cookie(&forged)).is_none());

        let expired = sign(&claims("ram@gmail.com", -3600), SECRET);
        assert!(resolver.resolve(&header_with_cookie(&expired)).is_none());
    }

    #[test]
    fn no_token_resolves_to_none() {
        let resolver = JwtSessionResolver::new(SECRET, COOKIE);
        assert!(resolver.resolve(&HeaderMap::new()).is_none());
    }

    #[test]
    fn username_falls_back_to_local_part() {
        let resolver = JwtSessionResolver::new(SECRET, COOKIE);
        let mut c = claims("hari@yatayat.np", 3600);
        c.name = None;
        let token = sign(&c, SECRET);
        let p = resolver.resolve(&header_with_cookie(&token)).unwrap();
        assert_eq!(p.username, "hari");
    }
}
