use std::fmt;

use thiserror::Error;

/// Code reported when no protocol specific code could be determined
pub const UNKNOWN_ERROR_CODE: i32 = -1;

/// Code reported for requests that are missing a required attribute
pub const REQUEST_MALFORMED_CODE: i32 = 0;

/// Which stage of a retrieval produced a [`RetrievalError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required request attribute is missing or unreadable
    RequestMalformed,
    /// The pool could not hand out a connection
    PoolFault,
    /// Opening the session or channel failed
    ConnectionEstablishment,
    /// The remote side refused the file read
    Transfer,
    /// Anything else that went wrong while a connection was in use
    Unexpected,
}

/// The single error shape every failed retrieval is reported with.
///
/// `code` is either a protocol code (FTP reply code, SFTP status code), a code
/// from the connection error table, or [`UNKNOWN_ERROR_CODE`].
pub struct RetrievalError {
    kind: ErrorKind,
    code: i32,
    description: String,
    cause: Option<anyhow::Error>,
}

impl RetrievalError {
    pub fn new(kind: ErrorKind, code: i32, description: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            description: description.into(),
            cause: None,
        }
    }

    /// Creates an error for a request missing one of its attributes
    pub fn malformed(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestMalformed, REQUEST_MALFORMED_CODE, description)
    }

    /// Attaches the underlying failure
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }
}

impl fmt::Debug for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalError")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("description", &self.description)
            .field("cause", &self.cause.as_ref().map(|e| e.to_string()))
            .finish()
    }
}

impl fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)
    }
}

impl std::error::Error for RetrievalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|e| {
            let e: &(dyn std::error::Error + 'static) = e.as_ref();
            e
        })
    }
}

/// Failure reported by a [`ConnectionPool`](crate::ConnectionPool) when it cannot
/// hand out a connection
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool rejected the borrow with its own code and reason
    #[error("{reason}")]
    Rejected { code: i32, reason: String },

    /// No connection could be created within the configured connect timeout
    #[error("timed out after {0:?} waiting for a connection")]
    Timeout(std::time::Duration),

    /// Creating the connection failed
    #[error(transparent)]
    Connect(#[from] anyhow::Error),
}

impl PoolError {
    /// Code reported by the pool itself, if it gave one
    pub fn code(&self) -> Option<i32> {
        match self {
            PoolError::Rejected { code, .. } => Some(*code),
            PoolError::Timeout(_) | PoolError::Connect(_) => None,
        }
    }
}

/// Failure raised by an SFTP get-file request.
///
/// Its string form is `"<code>: <message>"`, the code being the SFTP status code.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct SftpError {
    pub code: u32,
    pub message: String,
}

impl SftpError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_carries_code_and_description() {
        let err = RetrievalError::new(ErrorKind::Transfer, 550, "550 No such file.");
        assert_eq!(err.to_string(), "[550] 550 No such file.");
    }

    #[test]
    fn test_malformed_uses_code_zero() {
        let err = RetrievalError::malformed("srcFile missing");
        assert_eq!(err.code(), REQUEST_MALFORMED_CODE);
        assert_eq!(err.kind(), ErrorKind::RequestMalformed);
        assert!(err.source().is_none());
    }

    #[test]
    fn test_cause_is_exposed_as_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = RetrievalError::new(ErrorKind::Unexpected, 426, "426 aborted").with_cause(io_err);
        assert_eq!(err.source().map(|e| e.to_string()).as_deref(), Some("pipe closed"));
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_sftp_error_string_form() {
        let err = SftpError::new(2, "No such file");
        assert_eq!(err.to_string(), "2: No such file");
    }

    #[test]
    fn test_pool_error_code() {
        let rejected = PoolError::Rejected {
            code: 421,
            reason: "too many connections".to_string(),
        };
        assert_eq!(rejected.code(), Some(421));
        assert_eq!(rejected.to_string(), "too many connections");
        assert_eq!(PoolError::Connect(anyhow::anyhow!("boom")).code(), None);
    }
}
