use tracing::debug;

use crate::error::{ErrorKind, RetrievalError};

/// Code used when a connection failure matches no entry of the table
pub const UNKNOWN_CONNECTION_ERROR_CODE: i32 = 8;

const DESCRIPTION_PREFIX: &str = "Connection could not be established with Network Element due to ";

/// Known connection failures, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorMapping {
    ConnectionTimedOut,
    InvalidAddress,
    UnknownHost,
    UsernameNotNull,
    SessionDown,
    ConnectionRefused,
    ReadTimedOut,
    AuthFail,
}

impl ConnectionErrorMapping {
    /// Every mapping in match order, first match wins
    pub const ALL: [ConnectionErrorMapping; 8] = [
        ConnectionErrorMapping::ConnectionTimedOut,
        ConnectionErrorMapping::InvalidAddress,
        ConnectionErrorMapping::UnknownHost,
        ConnectionErrorMapping::UsernameNotNull,
        ConnectionErrorMapping::SessionDown,
        ConnectionErrorMapping::ConnectionRefused,
        ConnectionErrorMapping::ReadTimedOut,
        ConnectionErrorMapping::AuthFail,
    ];

    pub fn code(self) -> i32 {
        match self {
            ConnectionErrorMapping::ConnectionTimedOut
            | ConnectionErrorMapping::InvalidAddress
            | ConnectionErrorMapping::UnknownHost => 9,
            ConnectionErrorMapping::UsernameNotNull
            | ConnectionErrorMapping::SessionDown
            | ConnectionErrorMapping::ConnectionRefused
            | ConnectionErrorMapping::ReadTimedOut
            | ConnectionErrorMapping::AuthFail => 0,
        }
    }

    /// Text searched for in the failure message
    pub fn match_text(self) -> &'static str {
        match self {
            ConnectionErrorMapping::ConnectionTimedOut => "Connection timed out",
            ConnectionErrorMapping::InvalidAddress => "Address is invalid",
            ConnectionErrorMapping::UnknownHost => "UnknownHostException",
            ConnectionErrorMapping::UsernameNotNull => "username must not be null",
            ConnectionErrorMapping::SessionDown => "session is down",
            ConnectionErrorMapping::ConnectionRefused => "Connection refused",
            ConnectionErrorMapping::ReadTimedOut => "Read timed out",
            ConnectionErrorMapping::AuthFail => "Auth fail",
        }
    }

    /// Reason reported to the caller
    pub fn reply(self) -> &'static str {
        match self {
            ConnectionErrorMapping::ConnectionTimedOut => "incorrect ip address for remote host",
            ConnectionErrorMapping::InvalidAddress => "incorrect ip address/port for remote host",
            ConnectionErrorMapping::UnknownHost
            | ConnectionErrorMapping::SessionDown
            | ConnectionErrorMapping::ConnectionRefused => {
                "remote host not avaialble for sftp connection"
            }
            ConnectionErrorMapping::UsernameNotNull => "sftp login username in not valid or null",
            ConnectionErrorMapping::ReadTimedOut => "ftpclient/server comunication timed out",
            ConnectionErrorMapping::AuthFail => "sftp login username/password incorrect",
        }
    }

    /// First mapping whose text occurs in `message`
    pub fn find(message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mapping| message.contains(mapping.match_text()))
    }
}

/// Turns a connection-establishment failure into a [`RetrievalError`].
///
/// SSH libraries report why a session or channel could not be opened only as
/// free text, so the causes in [`ConnectionErrorMapping`] are recognised by
/// substring over the whole error chain; the interesting text (`Connection
/// refused`, `Auth fail`) often sits on an inner error. Text that matches
/// nothing is passed through with [`UNKNOWN_CONNECTION_ERROR_CODE`].
pub fn translate(error: anyhow::Error) -> RetrievalError {
    let message = format!("{error:#}");
    let (code, reason) = match ConnectionErrorMapping::find(&message) {
        Some(mapping) => {
            debug!("Connection failure classified as {:?}", mapping);
            (mapping.code(), mapping.reply().to_string())
        }
        None => (UNKNOWN_CONNECTION_ERROR_CODE, message),
    };
    RetrievalError::new(
        ErrorKind::ConnectionEstablishment,
        code,
        format!("{DESCRIPTION_PREFIX}{reason}"),
    )
    .with_cause(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_auth_fail() {
        let err = translate(anyhow!("Auth fail"));
        assert_eq!(err.code(), ConnectionErrorMapping::AuthFail.code());
        assert_eq!(
            err.description(),
            "Connection could not be established with Network Element due to sftp login username/password incorrect"
        );
        assert_eq!(err.kind(), ErrorKind::ConnectionEstablishment);
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_unknown_keeps_raw_message() {
        let err = translate(anyhow!("kex exchange identification: banner line contains invalid characters"));
        assert_eq!(err.code(), UNKNOWN_CONNECTION_ERROR_CODE);
        assert_eq!(
            err.description(),
            "Connection could not be established with Network Element due to kex exchange identification: banner line contains invalid characters"
        );
    }

    #[test]
    fn test_declared_order_wins() {
        // Both "Connection timed out" and "Auth fail" occur, the earlier entry is used
        let err = translate(anyhow!("Auth fail after Connection timed out"));
        assert_eq!(err.code(), 9);
        assert!(err.description().ends_with("incorrect ip address for remote host"));
    }

    #[test]
    fn test_matches_inner_cause() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = translate(anyhow::Error::new(io_err).context("failed to connect to 10.0.0.1:22"));
        assert_eq!(err.code(), 0);
        assert!(err.description().ends_with("remote host not avaialble for sftp connection"));
    }

    #[test]
    fn test_codes_per_entry() {
        let codes: Vec<i32> = ConnectionErrorMapping::ALL.iter().map(|m| m.code()).collect();
        assert_eq!(codes, vec![9, 9, 9, 0, 0, 0, 0, 0]);
    }
}
