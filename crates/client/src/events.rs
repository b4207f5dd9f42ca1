//! Session lifecycle events published by the gateway.
//!
//! Subscribers (the CLI, a UI shell) use these to react to logins and to
//! the forced logout that follows an authentication failure.

use widgetdash_core::types::DbId;

/// Broadcast channel capacity for session events.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A credential was stored after login or registration.
    LoggedIn { user_id: DbId },

    /// The user logged out explicitly.
    LoggedOut,

    /// The backend rejected the credential. The session has been cleared
    /// and the user must be sent to `redirect_to`.
    ForcedLogout { redirect_to: &'static str },
}
