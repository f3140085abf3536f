use std::fmt;

/// Result type alias for bidstream core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bidstream core operations
#[derive(Debug)]
pub enum Error {
    /// I/O errors from the output sink
    Io(std::io::Error),

    /// Configuration errors (fatal at startup)
    Config(String),

    /// Event encoding errors
    Serialization(String),

    /// Sink errors other than raw I/O
    Sink(String),

    /// A worker or dispatcher thread panicked
    Thread(String),

    /// Other errors
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Error::Sink(msg) => write!(f, "Sink error: {msg}"),
            Error::Thread(msg) => write!(f, "Thread error: {msg}"),
            Error::Other(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::Config("rate must be > 0".into()).to_string(),
            "Configuration error: rate must be > 0"
        );
        let io = Error::from(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
        assert!(io.to_string().starts_with("I/O error"));
        assert!(std::error::Error::source(&io).is_some());
    }
}
