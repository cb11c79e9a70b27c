//! Bridge between the protocol engine and the session registry

use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use log::{debug, warn};
use mailin::response::{AUTH_OK, INVALID_CREDENTIALS, OK};
use mailin::{Handler, Response};

use crate::smtp::backend::Backend;
use crate::smtp::error::ServerError;
use crate::smtp::mail::Mail;
use crate::smtp::session::Session;

/// Per-connection callback target driven by the protocol engine.
///
/// The engine owns command parsing and sequencing; this type only records
/// what arrives into the session shared with the registry. DATA bytes are
/// buffered here and committed as one message when the engine signals the
/// end of the payload.
pub(crate) struct SessionHandler {
    backend: Arc<Backend>,
    session: Arc<Session>,
    data: Vec<u8>,
}

impl SessionHandler {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        let session = backend.create_session();
        Self {
            backend,
            session,
            data: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Decode the buffered payload and publish it.
    ///
    /// Decode failures leave the session untouched. Observer errors reject
    /// the message, but the session already holds it by then; that partial
    /// state is intentional, matching the store-then-notify order.
    fn commit(&mut self) -> Result<(), ServerError> {
        let raw = std::mem::take(&mut self.data);
        let mail = Mail::parse(raw)?;
        self.session.record_mail(mail.clone());

        let from = self.session.from();
        let recipients = self.session.recipients();
        let to = recipients.first().cloned().unwrap_or_default();
        self.backend
            .notify(&from, &to, &recipients, &mail)
            .map_err(|err| ServerError::Rejected(err.to_string()))
    }
}

impl Handler for SessionHandler {
    fn mail(&mut self, _ip: IpAddr, _domain: &str, from: &str) -> Response {
        self.session.record_sender(strip_angle_brackets(from));
        OK
    }

    fn rcpt(&mut self, to: &str) -> Response {
        self.session.record_recipient(strip_angle_brackets(to));
        OK
    }

    fn data_start(&mut self, _domain: &str, _from: &str, _is8bit: bool, _to: &[String]) -> Response {
        self.data.clear();
        OK
    }

    fn data(&mut self, buf: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(buf);
        Ok(())
    }

    fn data_end(&mut self) -> Response {
        match self.commit() {
            Ok(()) => {
                debug!("recorded message from {}", self.session.from());
                OK
            }
            Err(err) => {
                warn!("rejecting message: {err}");
                Response::custom(554, format!("transaction failed: {err}"))
            }
        }
    }

    fn auth_plain(
        &mut self,
        authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> Response {
        if self
            .backend
            .authenticate(authorization_id, authentication_id, password)
        {
            AUTH_OK
        } else {
            debug!("rejecting AUTH PLAIN for {authentication_id}");
            INVALID_CREDENTIALS
        }
    }
}

/// The engine hands over paths as they appear on the wire; some clients
/// keep the RFC 5321 angle brackets around the address.
fn strip_angle_brackets(address: &str) -> &str {
    address
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
}
