//! # smtpmock
//!
//! An in-process mock SMTP server for test suites.
//!
//! It lets code that sends mail be tested against a real socket, without a
//! real mail transfer agent and without mocking the mail client. The wire
//! protocol is handled by the [`mailin`] state machine and message decoding
//! by [`mailparse`]; this crate records what arrives and makes it queryable.
//!
//! ## Quick Start
//!
//! ```rust
//! use lettre::{Message, SmtpTransport, Transport};
//! use smtpmock::SmtpMock;
//!
//! let mut server = SmtpMock::builder().start().unwrap();
//!
//! let message = Message::builder()
//!     .from("Hanako <hanako@example.com>".parse().unwrap())
//!     .to("Tarou <tarou@example.com>".parse().unwrap())
//!     .subject("Hello")
//!     .body("Hi there".to_string())
//!     .unwrap();
//!
//! let mailer = SmtpTransport::builder_dangerous(server.address().ip().to_string())
//!     .port(server.address().port())
//!     .build();
//! mailer.send(&message).unwrap();
//!
//! let sessions = server.sessions();
//! assert_eq!(sessions.len(), 1);
//! assert_eq!(sessions[0].from(), "hanako@example.com");
//! assert_eq!(server.messages()[0].subject(), Some("Hello"));
//!
//! server.close();
//! ```
//!
//! ## What is recorded
//!
//! Every connection gets a [`Session`] holding the envelope (sender and
//! recipients) and, once DATA completes, the decoded message together with a
//! byte-exact copy of the payload. Sessions are kept for the lifetime of the
//! server, in connection order, and are safe to inspect from the test thread
//! while transactions are still in flight.
//!
//! ## Optional behavior
//!
//! - `credentials(user, pass)` offers AUTH PLAIN and rejects anything else;
//!   without it, authentication is not offered at all.
//! - `on_receive(observer)` registers callbacks that run for every completed
//!   transaction; an observer error rejects the DATA command.
//!
//! ## Notes
//!
//! - Runs in-memory only; nothing is persisted or relayed.
//! - STARTTLS is not offered.
//! - A session records exactly one transaction. Reusing a connection for a
//!   second transaction overwrites the record, so send each message over its
//!   own connection.

mod smtp;

pub use smtp::{Mail, OnReceive, OnReceiveResult, ServerError, Session, SmtpMock, SmtpMockBuilder};
