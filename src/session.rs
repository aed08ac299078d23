use anyhow::{Context, anyhow};
use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder};
use openssh_sftp_client::error::SftpErrorKind;
use openssh_sftp_client::file::TokioCompatFile;
use openssh_sftp_client::{Sftp, SftpOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SshConfig;
use crate::error::SftpError;
use crate::operations::sftp::SftpChannel;
use crate::pool::ConnectionFactory;
use crate::stream::BoxedReader;
use crate::types::ConnectionKey;
use crate::utils::check_connection;

/// SFTP status code for a missing file
pub const SSH_FX_NO_SUCH_FILE: u32 = 2;
/// SFTP status code for a file the user may not read
pub const SSH_FX_PERMISSION_DENIED: u32 = 3;
/// SFTP status code for any other failure
pub const SSH_FX_FAILURE: u32 = 4;
/// SFTP status code for a malformed packet
pub const SSH_FX_BAD_MESSAGE: u32 = 5;
/// SFTP status code for an operation the server does not support
pub const SSH_FX_OP_UNSUPPORTED: u32 = 8;

/// An SSH session with an SFTP channel running on it
#[derive(Debug)]
pub struct SshSftpConnection {
    sftp: Sftp,
    session: Arc<Session>,
}

#[async_trait]
impl SftpChannel for SshSftpConnection {
    async fn get(&mut self, path: &str) -> Result<BoxedReader, SftpError> {
        let file = self.sftp.open(path).await.map_err(sftp_error)?;
        debug!("Remote file opened: {:?}", path);
        Ok(Box::pin(TokioCompatFile::new(file)))
    }
}

/// Opens SSH sessions with key based authentication and starts SFTP on them.
///
/// Sessions are multiplexed through the system `ssh` binary, so the password of
/// a [`ConnectionKey`] is not used; the configured key file, or the ssh
/// defaults, authenticate the user.
#[derive(Debug, Clone)]
pub struct SshSftpFactory {
    config: SshConfig,
}

impl SshSftpFactory {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for SshSftpFactory {
    type Connection = SshSftpConnection;

    async fn connect(&self, key: &ConnectionKey) -> Result<SshSftpConnection, anyhow::Error> {
        let username = key
            .username()
            .ok_or_else(|| anyhow!("username must not be null"))?;
        info!("Connecting to {:?}@{:?}:{}", username, key.host(), key.port());

        let mut builder = SessionBuilder::default();
        builder
            .user(username.to_string())
            .port(key.port())
            .control_directory(&self.config.control_dir)
            .known_hosts_check(if self.config.accept_unknown_hosts {
                KnownHosts::Accept
            } else {
                KnownHosts::Strict
            });
        if let Some(keyfile) = &self.config.keyfile {
            builder.keyfile(keyfile);
        }
        let session = builder
            .connect(key.host())
            .await
            .with_context(|| format!("failed to open ssh session to {key}"))?;
        let session = Arc::new(session);

        let sftp = Sftp::from_clonable_session_with_check_connection(
            session.clone(),
            SftpOptions::default(),
            check_connection,
        )
        .await
        .with_context(|| format!("failed to start sftp on {key}"))?;
        debug!("sftp channel created successfully");

        Ok(SshSftpConnection { sftp, session })
    }

    async fn validate(&self, connection: &mut SshSftpConnection) -> bool {
        if connection.session.check().await.is_ok() {
            true
        } else {
            warn!("Underlying ssh session is dead, dropping pooled sftp channel");
            false
        }
    }
}

/// SFTP status code of a failure kind reported by the server
fn status_code(kind: SftpErrorKind) -> u32 {
    match kind {
        SftpErrorKind::NoSuchFile => SSH_FX_NO_SUCH_FILE,
        SftpErrorKind::PermDenied => SSH_FX_PERMISSION_DENIED,
        SftpErrorKind::BadMessage => SSH_FX_BAD_MESSAGE,
        SftpErrorKind::OpUnsupported => SSH_FX_OP_UNSUPPORTED,
        _ => SSH_FX_FAILURE,
    }
}

/// Server failures keep their status code and message, client side failures
/// are reported as [`SSH_FX_FAILURE`]
fn sftp_error(error: openssh_sftp_client::Error) -> SftpError {
    match error {
        openssh_sftp_client::Error::SftpError(kind, msg) => {
            let (message, _language_tag) = msg.get();
            SftpError::new(status_code(kind), message)
        }
        other => SftpError::new(SSH_FX_FAILURE, other.to_string()),
    }
}
