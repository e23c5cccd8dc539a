use thiserror::Error;

use crate::register::Quantity;

/// Failures raised by the register catalog, identity resolution and
/// yield extraction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog {family} has no descriptor for {quantity}")]
    UnsupportedQuantity {
        family: &'static str,
        quantity: Quantity,
    },

    #[error("device identity needs an inverter id or make, model and serial: {0}")]
    IncompleteIdentity(String),

    #[error("device identity {candidate} matches {matches} known devices")]
    AmbiguousIdentity { candidate: String, matches: usize },

    #[error("malformed row from {source_name} at {timestamp}: {reason}")]
    MalformedRow {
        source_name: String,
        timestamp: String,
        reason: String,
    },

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("register catalog error: {0}")]
    Catalog(String),
}

/// Raised by a [`crate::extract::Connection`] implementation. Always aborts
/// the extraction call that observed it.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("undecodable datalog line {line}: {reason}")]
    Decode { line: usize, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Creates an anyhow error with the current file and line number
#[macro_export]
macro_rules! file_error {
    ($($arg:tt)*) => {
        anyhow::anyhow!(
            "[{}:{}] {}",
            std::path::Path::new(file!())
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            line!(),
            format!($($arg)*)
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_converts() {
        let err: Error = ConnectionError::Other("socket closed".to_string()).into();
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(err.to_string(), "connection error: socket closed");
    }

    #[test]
    fn file_error_carries_location() {
        let err = file_error!("bad value {}", 7);
        let msg = err.to_string();
        assert!(msg.starts_with("[error.rs:"), "{}", msg);
        assert!(msg.ends_with("bad value 7"));
    }
}
