//! Per-connection transaction record

use std::sync::{PoisonError, RwLock};

use crate::smtp::mail::Mail;

/// Server-side record of one SMTP transaction.
///
/// A session is created when a client connects and is populated by the
/// protocol engine as the envelope and body arrive. It stays alive for the
/// lifetime of the server as a historical record, so test code can inspect
/// it at any point, including while the transaction is still in flight.
///
/// All fields sit behind one per-session lock; accessors return defensive
/// copies rather than references into the live state.
#[derive(Debug, Default)]
pub struct Session {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    from: String,
    recipients: Vec<String>,
    mail: Option<Mail>,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sender(&self, from: &str) {
        let mut state = self.write();
        state.from = from.to_owned();
    }

    pub(crate) fn record_recipient(&self, to: &str) {
        let mut state = self.write();
        state.recipients.push(to.to_owned());
    }

    pub(crate) fn record_mail(&self, mail: Mail) {
        let mut state = self.write();
        state.mail = Some(mail);
    }

    /// The sender address from the MAIL command.
    pub fn from(&self) -> String {
        self.read().from.clone()
    }

    /// The first accepted recipient, or `None` before any RCPT command.
    ///
    /// Kept for parity with single-recipient assertions; prefer
    /// [`Session::recipients`].
    pub fn to(&self) -> Option<String> {
        self.read().recipients.first().cloned()
    }

    /// All accepted recipients, in the order the RCPT commands arrived.
    pub fn recipients(&self) -> Vec<String> {
        self.read().recipients.clone()
    }

    /// The decoded message, or `None` while the transaction is in flight.
    pub fn message(&self) -> Option<Mail> {
        self.read().mail.clone()
    }

    /// The raw DATA payload, set at the same instant as [`Session::message`].
    pub fn raw_message(&self) -> Option<Vec<u8>> {
        self.read().mail.as_ref().map(|mail| mail.raw().to_vec())
    }

    /// Whether the transaction has completed.
    pub fn is_complete(&self) -> bool {
        self.read().mail.is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
