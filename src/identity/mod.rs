//! Central identity resolution for the service.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod resolver;

pub use principal::Principal;
pub use resolver::{JwtSessionResolver, SessionClaims, SessionResolver};
