//! Persisted session store.
//!
//! [`SessionStore`] holds the bearer token and user profile for the
//! current session. It is a cheap-to-clone context object handed to the
//! gateway and the front end; every clone observes the same session.
//! The session is written through a [`SessionPersistence`] backend so it
//! survives a process restart.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use widgetdash_core::models::User;

/// A stored credential: opaque bearer token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Errors from reading or writing persisted session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Session file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Persistence backends
// ---------------------------------------------------------------------------

/// Durable storage for the session.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<Session>, SessionError>;
    fn save(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Stores the session as a JSON file.
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionPersistence for FileSessionPersistence {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(session)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the session in memory only. Used by tests and short-lived tools.
#[derive(Default)]
pub struct MemorySessionPersistence {
    slot: Mutex<Option<Session>>,
}

impl SessionPersistence for MemorySessionPersistence {
    fn load(&self) -> Result<Option<Session>, SessionError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<(), SessionError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// The current session, shared by every clone.
///
/// Initialized from persisted state by [`open`](Self::open); torn down by
/// [`clear_credential`](Self::clear_credential) on logout or a 401.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    current: RwLock<Option<Session>>,
    persistence: Box<dyn SessionPersistence>,
}

impl SessionStore {
    /// Open a store and load any persisted session.
    ///
    /// Unreadable or corrupt persisted state is logged and treated as no
    /// session.
    pub fn open(persistence: impl SessionPersistence + 'static) -> Self {
        let current = match persistence.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable persisted session");
                None
            }
        };

        if let Some(session) = &current {
            tracing::debug!(user_id = session.user.id, "Restored persisted session");
        }

        Self {
            inner: Arc::new(Inner {
                current: RwLock::new(current),
                persistence: Box::new(persistence),
            }),
        }
    }

    /// Open a store backed by a JSON file at `path`.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::open(FileSessionPersistence::new(path))
    }

    /// Open a store that never touches disk.
    pub fn in_memory() -> Self {
        Self::open(MemorySessionPersistence::default())
    }

    /// Store a new credential and persist it.
    ///
    /// The in-memory session is replaced even when persisting fails.
    pub fn set_credential(&self, token: String, user: User) -> Result<(), SessionError> {
        let session = Session { token, user };
        let result = self.inner.persistence.save(&session);
        *self.write() = Some(session);
        result
    }

    /// Drop the credential from memory and from durable storage.
    ///
    /// The in-memory session is always cleared; only the persistence
    /// error, if any, is reported.
    pub fn clear_credential(&self) -> Result<(), SessionError> {
        *self.write() = None;
        self.inner.persistence.clear()
    }

    pub fn has_credential(&self) -> bool {
        self.read().is_some()
    }

    /// The bearer token, if a credential is present.
    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.token.clone())
    }

    /// The stored user profile, if a credential is present.
    pub fn user(&self) -> Option<User> {
        self.read().as_ref().map(|s| s.user.clone())
    }

    /// Replace the stored profile while keeping the token.
    pub fn update_user(&self, user: User) -> Result<(), SessionError> {
        let mut guard = self.write();
        match guard.as_mut() {
            Some(session) => {
                session.user = user;
                self.inner.persistence.save(session)
            }
            None => Ok(()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.inner
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.inner
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("has_credential", &self.has_credential())
            .finish()
    }
}
