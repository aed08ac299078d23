use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{ErrorKind, PoolError, RetrievalError, SftpError, UNKNOWN_ERROR_CODE};
use crate::pool::ConnectionPool;
use crate::stream::{BoxedReader, ContentStream};
use crate::translate::translate;
use crate::types::{Protocol, RequestAttributes, RetrievalResult, TransferRequest};
use crate::utils::{build_destination_path, extract_sftp_error_code, normalize_source_path};

/// A pooled SFTP channel able to open remote files for reading
#[async_trait]
pub trait SftpChannel: Send + 'static {
    /// Opens `path` for reading. Every failure is reported as an [`SftpError`].
    async fn get(&mut self, path: &str) -> Result<BoxedReader, SftpError>;
}

/// Retrieves files over SFTP from pooled channels
pub struct SftpRetrievalHandler<Q> {
    pool: Arc<Q>,
}

impl<Q> SftpRetrievalHandler<Q>
where
    Q: ConnectionPool,
    Q::Connection: SftpChannel,
{
    pub fn new(pool: Arc<Q>) -> Self {
        Self { pool }
    }

    /// Assembles the request from `attrs` and retrieves the file
    pub async fn process(
        &self,
        attrs: &mut RequestAttributes,
    ) -> Result<RetrievalResult, RetrievalError> {
        let request = TransferRequest::from_attributes(attrs)?;
        debug!(
            "process will be called for sourceDir=[{}] and sourceFile=[{}], destDir=[{}] and destFile=[{}]",
            request.source_dir, request.source_file, request.dest_dir, request.dest_file
        );
        let result = self.retrieve(request).await?;
        super::publish_result(attrs, &result);
        Ok(result)
    }

    /// Borrows a channel and opens the request's source file on it.
    ///
    /// Failing to borrow means the session or channel could not be opened; that
    /// failure is classified by [`translate`]. A failed get carries the SFTP
    /// status code read from the error.
    pub async fn retrieve(&self, request: TransferRequest) -> Result<RetrievalResult, RetrievalError> {
        let key = request.connection_key;
        debug!("About to borrow channel with key=[{}]", key);
        let mut channel = self.pool.borrow(&key).await.map_err(|e| {
            error!(
                "Exception caught while borrowing an SFTP channel for {}: {}",
                key, e
            );
            match e {
                PoolError::Connect(cause) => translate(cause),
                other => translate(anyhow::Error::new(other)),
            }
        })?;

        let file_to_get = normalize_source_path(&request.source_dir, &request.source_file);
        let reader = match channel.get(&file_to_get).await {
            Ok(reader) => reader,
            Err(e) => {
                error!(
                    "Exception caught while trying to getFile=[{}]: {}",
                    file_to_get, e
                );
                self.pool.release(&key, channel);
                return Err(transfer_error(&file_to_get, e));
            }
        };

        let pool = Arc::clone(&self.pool);
        let hook_key = key.clone();
        let content = ContentStream::with_release(
            reader,
            Box::new(move |complete| {
                if complete {
                    pool.release(&hook_key, channel);
                } else {
                    pool.discard(&hook_key, channel);
                }
            }),
        );

        Ok(RetrievalResult {
            content,
            destination_path: build_destination_path(&request.dest_dir, &request.dest_file),
            connection_key: key.without_credentials(),
            protocol: Protocol::Sftp,
        })
    }
}

fn transfer_error(file_to_get: &str, e: SftpError) -> RetrievalError {
    let code = extract_sftp_error_code(&e.to_string()).unwrap_or(UNKNOWN_ERROR_CODE);
    let description = format!(
        "An SftpException {} occured trying to download the file {{{}}} to an output stream",
        e.message, file_to_get
    );
    RetrievalError::new(ErrorKind::Transfer, code, description).with_cause(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionKey, attributes};
    use anyhow::anyhow;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FakeChannel {
        files: HashMap<String, &'static [u8]>,
    }

    #[async_trait]
    impl SftpChannel for FakeChannel {
        async fn get(&mut self, path: &str) -> Result<BoxedReader, SftpError> {
            match self.files.get(path) {
                Some(body) => Ok(Box::pin(Cursor::new(*body))),
                None => Err(SftpError::new(2, "No such file")),
            }
        }
    }

    #[derive(Default)]
    struct FakePool {
        connect_error: Option<&'static str>,
        borrowed: Mutex<Vec<ConnectionKey>>,
        released: Mutex<usize>,
    }

    #[async_trait]
    impl ConnectionPool for FakePool {
        type Connection = FakeChannel;

        async fn borrow(&self, key: &ConnectionKey) -> Result<FakeChannel, PoolError> {
            self.borrowed.lock().unwrap().push(key.clone());
            if let Some(message) = self.connect_error {
                return Err(PoolError::Connect(anyhow!(message)));
            }
            let mut files = HashMap::new();
            files.insert("/var/opt/pm/A1.xml".to_string(), &b"<measData/>"[..]);
            Ok(FakeChannel { files })
        }

        fn release(&self, _key: &ConnectionKey, _connection: FakeChannel) {
            *self.released.lock().unwrap() += 1;
        }
    }

    fn attrs(file: &str) -> RequestAttributes {
        [
            (attributes::SOURCE_DIRECTORY, "/var/opt/pm"),
            (attributes::SOURCE_FILE, file),
            (attributes::DESTINATION_DIRECTORY, "out/"),
            (attributes::DESTINATION_FILE, "A1.xml"),
            (attributes::TARGET_IP_ADDRESS, "10.0.0.9"),
            (attributes::TARGET_PORT, "22"),
            (attributes::SECURE_FTP, "true"),
            (attributes::TARGET_USERNAME, "pm"),
            (attributes::TARGET_PASSWORD, "pm123"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_successful_retrieval() {
        let pool = Arc::new(FakePool::default());
        let handler = SftpRetrievalHandler::new(pool.clone());
        let mut attrs = attrs("A1.xml");

        let result = handler.process(&mut attrs).await.unwrap();
        assert_eq!(result.destination_path, "out/A1.xml");
        assert_eq!(result.protocol, Protocol::Sftp);
        assert_eq!(attrs.get(attributes::DESTINATION_PATH), Some("out/A1.xml"));
        assert_eq!(attrs.get(attributes::CONNECTION_KEY), Some("10.0.0.9:22 (secure=true)"));
        assert!(!attrs.contains(attributes::TARGET_PASSWORD));

        let borrowed = pool.borrowed.lock().unwrap().clone();
        assert_eq!(borrowed[0].password(), Some("pm123"));

        let body = result.content.read_to_end().await.unwrap();
        assert_eq!(&body[..], b"<measData/>");
        assert_eq!(*pool.released.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_reports_sftp_code() {
        let pool = Arc::new(FakePool::default());
        let handler = SftpRetrievalHandler::new(pool.clone());

        let err = handler.process(&mut attrs("/missing.xml")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transfer);
        assert_eq!(err.code(), 2);
        assert_eq!(
            err.description(),
            "An SftpException No such file occured trying to download the file {/var/opt/pm/missing.xml} to an output stream"
        );
        assert_eq!(*pool.released.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_failure_is_translated() {
        let pool = Arc::new(FakePool {
            connect_error: Some("ssh: connect to host 10.0.0.9 port 22: Connection refused"),
            ..FakePool::default()
        });
        let handler = SftpRetrievalHandler::new(pool);

        let err = handler.process(&mut attrs("A1.xml")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionEstablishment);
        assert_eq!(err.code(), 0);
        assert_eq!(
            err.description(),
            "Connection could not be established with Network Element due to remote host not avaialble for sftp connection"
        );
    }

    #[tokio::test]
    async fn test_pool_timeout_is_translated() {
        struct SlowPool;

        #[async_trait]
        impl ConnectionPool for SlowPool {
            type Connection = FakeChannel;

            async fn borrow(&self, _key: &ConnectionKey) -> Result<FakeChannel, PoolError> {
                Err(PoolError::Timeout(std::time::Duration::from_secs(60)))
            }

            fn release(&self, _key: &ConnectionKey, _connection: FakeChannel) {}
        }

        let handler = SftpRetrievalHandler::new(Arc::new(SlowPool));
        let err = handler.process(&mut attrs("A1.xml")).await.unwrap_err();
        assert_eq!(err.code(), crate::translate::UNKNOWN_CONNECTION_ERROR_CODE);
        assert!(err.description().ends_with("timed out after 60s waiting for a connection"));
    }

    #[test]
    fn test_transfer_error_uses_status_code() {
        let err = transfer_error("/a", SftpError::new(4, "Failure"));
        assert_eq!(err.code(), 4);
        assert!(err.description().contains("{/a}"));
    }
}
