//! Parsed message snapshot

use crate::smtp::error::ServerError;

/// A message received by the mock server.
///
/// Holds the structured view produced by the mail-header decoder together
/// with a byte-exact copy of the DATA payload. The two always travel
/// together: a `Mail` only exists once decoding succeeded.
#[derive(Debug, Clone)]
pub struct Mail {
    headers: Vec<(String, String)>,
    body: String,
    raw: Vec<u8>,
}

impl Mail {
    /// Decode a raw DATA payload.
    ///
    /// Returns an error when the payload is not a well-formed message, in
    /// which case nothing is stored anywhere.
    pub fn parse(raw: Vec<u8>) -> Result<Self, ServerError> {
        let parsed = mailparse::parse_mail(&raw)?;
        let headers = parsed
            .headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect();
        let body = parsed.get_body()?;
        Ok(Self { headers, body, raw })
    }

    /// Look up the first header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All headers in the order they appear in the message.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// The subject line, if present.
    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }

    /// The decoded message body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// The DATA payload exactly as it arrived on the wire.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}
