//! Session-presence route guard.
//!
//! Protected paths require a stored credential; the public entry pages
//! send an already-authenticated session on to the dashboard.

/// Where an unauthenticated session is sent.
pub const LOGIN_PATH: &str = "/login";

/// Where an authenticated session lands.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Paths that require a credential (including their sub-paths).
pub const PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/profile"];

/// Public pages that redirect an authenticated session away.
pub const PUBLIC_ENTRY_PATHS: &[&str] = &["/", "/login", "/register"];

/// Outcome of checking a path against the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

/// Decide whether `path` may be shown for a session with or without a
/// credential.
pub fn guard(path: &str, has_credential: bool) -> RouteDecision {
    if has_credential {
        if PUBLIC_ENTRY_PATHS.contains(&path) {
            return RouteDecision::Redirect(DASHBOARD_PATH);
        }
        return RouteDecision::Allow;
    }

    if is_protected(path) {
        RouteDecision::Redirect(LOGIN_PATH)
    } else {
        RouteDecision::Allow
    }
}

/// Returns `true` if `path` is, or lives under, a protected prefix.
pub fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path == *prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
