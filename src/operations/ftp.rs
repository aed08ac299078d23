use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::RetrievalConfig;
use crate::error::{ErrorKind, RetrievalError, UNKNOWN_ERROR_CODE};
use crate::pool::ConnectionPool;
use crate::stream::{BoxedReader, ContentStream};
use crate::types::{Protocol, RequestAttributes, RetrievalResult, TransferRequest};
use crate::utils::{build_destination_path, is_positive_reply, normalize_source_path};

/// Capabilities a pooled FTP connection offers to the retrieval handler.
///
/// Like most FTP client libraries, a negative server reply to a command does
/// not surface as an `Err`: callers read [`reply_code`](FtpConnection::reply_code)
/// after every command. Implementations finish the pending transfer reply of a
/// previous retrieval before issuing their next command.
#[async_trait]
pub trait FtpConnection: Send + 'static {
    /// Switches the connection to binary (image) transfer type
    async fn set_binary_mode(&mut self) -> Result<(), anyhow::Error>;

    /// Starts a RETR for `path`; `None` when the server refused to open a data stream
    async fn retrieve_stream(&mut self, path: &str) -> Result<Option<BoxedReader>, anyhow::Error>;

    /// Code of the last reply received from the server
    fn reply_code(&self) -> i32;

    /// Full text of the last reply received from the server
    fn reply_string(&self) -> String;
}

enum StreamFailure {
    /// The server said no; the control connection is still usable
    Refused(RetrievalError),
    /// The connection is in an unknown state
    Broken(RetrievalError),
}

/// Retrieves files over plain FTP from pooled connections
pub struct FtpRetrievalHandler<P> {
    pool: Arc<P>,
    config: Arc<RetrievalConfig>,
}

impl<P> FtpRetrievalHandler<P>
where
    P: ConnectionPool,
    P::Connection: FtpConnection,
{
    pub fn new(pool: Arc<P>, config: Arc<RetrievalConfig>) -> Self {
        Self { pool, config }
    }

    /// Assembles the request from `attrs` and retrieves the file
    pub async fn process(
        &self,
        attrs: &mut RequestAttributes,
    ) -> Result<RetrievalResult, RetrievalError> {
        let request = TransferRequest::from_attributes(attrs)?;
        let result = self.retrieve(request).await?;
        super::publish_result(attrs, &result);
        Ok(result)
    }

    /// Borrows a connection and opens a read stream for the request's source file.
    ///
    /// # Errors
    ///
    /// - the pool code and reason when no connection could be borrowed
    ///   ([`UNKNOWN_ERROR_CODE`] when the pool gave no code)
    /// - the server's reply code and text when the reply to the retrieve command
    ///   is not positive, even though the connection raised no error
    /// - the connection's current reply code and text for any other failure
    pub async fn retrieve(&self, request: TransferRequest) -> Result<RetrievalResult, RetrievalError> {
        let key = request.connection_key;
        debug!("About to borrow connection with key=[{}]", key);
        let mut connection = self.pool.borrow(&key).await.map_err(|e| {
            error!("Failed to borrow FTP connection for {}: {}", key, e);
            let code = e.code().unwrap_or(UNKNOWN_ERROR_CODE);
            RetrievalError::new(ErrorKind::PoolFault, code, e.to_string()).with_cause(e)
        })?;

        let source_path = normalize_source_path(&request.source_dir, &request.source_file);
        let reader = match self
            .open_stream(&mut connection, &request.source_file, &source_path)
            .await
        {
            Ok(reader) => reader,
            Err(StreamFailure::Refused(err)) => {
                error!(
                    "Error code: [{}] and description: [{}]",
                    err.code(),
                    err.description()
                );
                self.pool.release(&key, connection);
                return Err(err);
            }
            Err(StreamFailure::Broken(err)) => {
                error!(
                    "Unexpected failure fetching {}, reply code: [{}] and reply: [{}]",
                    source_path,
                    err.code(),
                    err.description()
                );
                self.pool.discard(&key, connection);
                return Err(err);
            }
        };

        let destination_path = build_destination_path(&request.dest_dir, &request.dest_file);
        debug!("{} will be stored at {}", source_path, destination_path);

        let pool = Arc::clone(&self.pool);
        let hook_key = key.clone();
        let content = ContentStream::with_release(
            reader,
            Box::new(move |complete| {
                if complete {
                    pool.release(&hook_key, connection);
                } else {
                    pool.discard(&hook_key, connection);
                }
            }),
        );

        Ok(RetrievalResult {
            content,
            destination_path,
            connection_key: key.without_credentials(),
            protocol: Protocol::Ftp,
        })
    }

    async fn open_stream(
        &self,
        connection: &mut P::Connection,
        source_file: &str,
        source_path: &str,
    ) -> Result<BoxedReader, StreamFailure> {
        if self.config.requires_binary(source_file) {
            connection
                .set_binary_mode()
                .await
                .map_err(|e| StreamFailure::Broken(unexpected(&*connection, e)))?;
        }

        debug!("getFile will be called for source: {}", source_path);
        let stream = connection
            .retrieve_stream(source_path)
            .await
            .map_err(|e| StreamFailure::Broken(unexpected(&*connection, e)))?;

        // A refused RETR comes back as a reply code, not as an error
        let code = connection.reply_code();
        if !is_positive_reply(code) {
            return Err(StreamFailure::Refused(RetrievalError::new(
                ErrorKind::Transfer,
                code,
                connection.reply_string(),
            )));
        }

        stream.ok_or_else(|| {
            StreamFailure::Broken(unexpected(
                connection,
                anyhow!("no data stream opened for {source_path}"),
            ))
        })
    }
}

fn unexpected(connection: &impl FtpConnection, cause: anyhow::Error) -> RetrievalError {
    RetrievalError::new(
        ErrorKind::Unexpected,
        connection.reply_code(),
        connection.reply_string(),
    )
    .with_cause(cause)
}
