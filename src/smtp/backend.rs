//! Session factory and registry

use std::sync::{Arc, PoisonError, RwLock};

use crate::smtp::mail::Mail;
use crate::smtp::session::Session;

/// Result type returned by [`OnReceive`] observers.
pub type OnReceiveResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Observer invoked synchronously for every completed transaction.
///
/// Observers run in registration order. `to` is the first accepted
/// recipient; the full list is in `recipients`. Returning an error rejects
/// the DATA command, and no further observers run for that message.
pub trait OnReceive: Send + Sync {
    fn on_receive(
        &self,
        from: &str,
        to: &str,
        recipients: &[String],
        mail: &Mail,
    ) -> OnReceiveResult;
}

impl<F> OnReceive for F
where
    F: Fn(&str, &str, &[String], &Mail) -> OnReceiveResult + Send + Sync,
{
    fn on_receive(
        &self,
        from: &str,
        to: &str,
        recipients: &[String],
        mail: &Mail,
    ) -> OnReceiveResult {
        self(from, to, recipients, mail)
    }
}

/// Credentials checked by the AUTH PLAIN callback.
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

/// Hands out a fresh [`Session`] for every inbound connection and keeps an
/// append-only registry of all sessions ever created.
///
/// The registry lock and the per-session locks are never held at the same
/// time: registry operations clone `Arc`s and release the lock before any
/// session field is touched.
pub(crate) struct Backend {
    credentials: Option<Credentials>,
    observers: Vec<Box<dyn OnReceive>>,
    sessions: RwLock<Vec<Arc<Session>>>,
}

impl Backend {
    pub(crate) fn new(credentials: Option<Credentials>, observers: Vec<Box<dyn OnReceive>>) -> Self {
        Self {
            credentials,
            observers,
            sessions: RwLock::new(Vec::new()),
        }
    }

    /// Create the record for a new connection and register it.
    pub(crate) fn create_session(&self) -> Arc<Session> {
        let session = Arc::new(Session::new());
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.push(Arc::clone(&session));
        session
    }

    /// Snapshot of every session in connection order.
    ///
    /// Entries may still be mid-transaction; their accessors take the
    /// per-session lock.
    pub(crate) fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether AUTH should be offered to connecting clients.
    pub(crate) fn offers_auth(&self) -> bool {
        self.credentials.is_some()
    }

    /// Check an AUTH PLAIN attempt against the configured credentials.
    ///
    /// A non-empty authorization identity must match the username, mirroring
    /// the usual PLAIN mechanism rules.
    pub(crate) fn authenticate(
        &self,
        authorization_id: &str,
        username: &str,
        password: &str,
    ) -> bool {
        let Some(credentials) = &self.credentials else {
            return false;
        };
        if !authorization_id.is_empty() && authorization_id != username {
            return false;
        }
        username == credentials.username && password == credentials.password
    }

    /// Run every observer in registration order, stopping at the first error.
    pub(crate) fn notify(
        &self,
        from: &str,
        to: &str,
        recipients: &[String],
        mail: &Mail,
    ) -> OnReceiveResult {
        for observer in &self.observers {
            observer.on_receive(from, to, recipients, mail)?;
        }
        Ok(())
    }
}
