//! Request-time access gate.
//! -------------------------
//! Every navigational request passes through here before any handler work:
//! unauthenticated callers are sent to the login surface, callers whose
//! registration is incomplete are pinned to the form, and completed callers
//! are kept off it. API, auth and static-asset paths are exempt via a
//! pattern set compiled once at startup.
//!
//! Failure policy is asymmetric on purpose: a missing session always
//! redirects (fail closed), while a failed profile-status lookup lets the
//! request through (fail open) so a store hiccup never blocks navigation.
//! Strict deployments can flip `fail_open` off, which instead pins the
//! caller to the form until the lookup recovers.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use regex::RegexSet;
use tracing::warn;

use crate::identity::Principal;
use crate::server::AppState;
use crate::store::model::ProfileStatus;
use crate::store::ProfileStore;

pub const LOGIN_PATH: &str = "/auth";
pub const FORM_PATH: &str = "/form";
pub const HOME_PATH: &str = "/";

/// What the gate knows about the caller once resolution and the status
/// lookup have run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// Authenticated; `Err` means the status lookup failed upstream.
    Authenticated(Result<ProfileStatus, StatusUnavailable>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUnavailable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect(&'static str),
}

pub struct GatePolicy {
    pub fail_open: bool,
    exempt: RegexSet,
}

impl GatePolicy {
    pub fn new(fail_open: bool) -> Self {
        let exempt = RegexSet::new([
            r"^/api(/|$)",
            r"^/auth(/|$)",
            r"^/static/",
            r"^/favicon\.ico$",
        ])
        .expect("exemption patterns are static");
        Self { fail_open, exempt }
    }

    /// Exempt paths bypass gating entirely.
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt.is_match(path)
    }

    /// The routing decision for a gated path.
    pub fn decide(&self, path: &str, session: &SessionState) -> GateDecision {
        match session {
            SessionState::Anonymous => GateDecision::Redirect(LOGIN_PATH),
            SessionState::Authenticated(Err(StatusUnavailable)) => {
                if self.fail_open || path == FORM_PATH {
                    GateDecision::Allow
                } else {
                    GateDecision::Redirect(FORM_PATH)
                }
            }
            SessionState::Authenticated(Ok(status)) => match status {
                ProfileStatus::Enabled if path == FORM_PATH => GateDecision::Redirect(HOME_PATH),
                ProfileStatus::Enabled => GateDecision::Allow,
                ProfileStatus::Disabled if path != FORM_PATH => GateDecision::Redirect(FORM_PATH),
                ProfileStatus::Disabled => GateDecision::Allow,
            },
        }
    }
}

/// Resolve the caller's session state, consulting the profile store for the
/// completion status. A profile that does not exist yet counts as disabled;
/// a lookup error is recorded as unavailable rather than surfaced.
pub(crate) async fn session_state(principal: Option<Principal>, profiles: &dyn ProfileStore) -> SessionState {
    let Some(p) = principal else {
        return SessionState::Anonymous;
    };
    match profiles.find_by_identity(&p.email).await {
        Ok(profile) => {
            let status = profile.map(|x| x.status).unwrap_or(ProfileStatus::Disabled);
            SessionState::Authenticated(Ok(status))
        }
        Err(e) => {
            warn!("gate status lookup failed for {}: {e}", p.email);
            SessionState::Authenticated(Err(StatusUnavailable))
        }
    }
}

/// Axum middleware wrapping the decision procedure. Runs before any handler
/// so a redirect short-circuits all downstream work.
pub async fn gate(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if state.gate.is_exempt(&path) {
        return next.run(req).await;
    }
    let principal = state.resolver.resolve(req.headers());
    let session = session_state(principal, state.profiles.as_ref()).await;
    match state.gate.decide(&path, &session) {
        GateDecision::Allow => next.run(req).await,
        GateDecision::Redirect(to) => Redirect::temporary(to).into_response(),
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod gate_tests;
