use tracing::{debug, error};

use crate::error::RetrievalError;
use crate::operations::ftp::{FtpConnection, FtpRetrievalHandler};
use crate::operations::sftp::{SftpChannel, SftpRetrievalHandler};
use crate::pool::ConnectionPool;
use crate::types::{Protocol, RequestAttributes, RetrievalResult, attributes};

const MISSING_SECURE_FLAG: &str = "The secureFtp header was not specified on the incoming message of the exchange. \
     Set it to false for FTP connections or true for SFTP connections";

/// Entry point for retrievals: picks the protocol handler from the request's
/// `secureFtp` attribute.
///
/// Holds no per-request state; one dispatcher can serve any number of
/// concurrent requests.
///
/// # Example
///
/// ```ignore
/// let dispatcher = RetrievalDispatcher::new(
///     FtpRetrievalHandler::new(ftp_pool, config.clone()),
///     SftpRetrievalHandler::new(sftp_pool),
/// );
/// let result = dispatcher.process(&mut attrs).await?;
/// let body = result.content.read_to_end().await?;
/// ```
pub struct RetrievalDispatcher<P, Q> {
    ftp: FtpRetrievalHandler<P>,
    sftp: SftpRetrievalHandler<Q>,
}

impl<P, Q> RetrievalDispatcher<P, Q>
where
    P: ConnectionPool,
    P::Connection: FtpConnection,
    Q: ConnectionPool,
    Q::Connection: SftpChannel,
{
    pub fn new(ftp: FtpRetrievalHandler<P>, sftp: SftpRetrievalHandler<Q>) -> Self {
        Self { ftp, sftp }
    }

    /// Retrieves the file described by `attrs`.
    ///
    /// On success `attrs` no longer holds the credentials and carries the
    /// destination path and the redacted connection key.
    pub async fn process(
        &self,
        attrs: &mut RequestAttributes,
    ) -> Result<RetrievalResult, RetrievalError> {
        debug!("Processing request...Looking for secure/unsecure header");
        let Some(flag) = attrs.get(attributes::SECURE_FTP) else {
            error!("{}", MISSING_SECURE_FLAG);
            return Err(RetrievalError::malformed(MISSING_SECURE_FLAG));
        };

        match Protocol::from_flag(flag) {
            Protocol::Sftp => {
                debug!("Secure flag is set on request, delegating to SFTP handler");
                self.sftp.process(attrs).await
            }
            Protocol::Ftp => {
                debug!("Secure flag is not set on request, delegating to FTP handler");
                self.ftp.process(attrs).await
            }
        }
    }
}
