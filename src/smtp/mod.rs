//! Mock SMTP server internals

pub mod backend;
pub mod error;
pub mod handler;
pub mod mail;
pub mod server;
pub mod session;

pub use backend::{OnReceive, OnReceiveResult};
pub use error::ServerError;
pub use mail::Mail;
pub use server::{SmtpMock, SmtpMockBuilder};
pub use session::Session;
