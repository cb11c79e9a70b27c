//! Error types for the mock server

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    #[error("message rejected by observer: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::Rejected("over quota".to_string());
        assert_eq!(err.to_string(), "message rejected by observer: over quota");
    }
}
