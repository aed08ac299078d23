// Module declarations
mod config;
mod dispatcher;
mod error;
mod logging;
mod operations;
mod pool;
mod session;
mod stream;
mod translate;
mod types;
mod utils;

// Public API exports
pub use config::{Config, PoolConfig, RetrievalConfig, SshConfig};
pub use dispatcher::RetrievalDispatcher;
pub use error::{
    ErrorKind, PoolError, REQUEST_MALFORMED_CODE, RetrievalError, SftpError, UNKNOWN_ERROR_CODE,
};
pub use logging::init_logging;
pub use operations::ftp::{FtpConnection, FtpRetrievalHandler};
pub use operations::sftp::{SftpChannel, SftpRetrievalHandler};
pub use pool::{ConnectionFactory, ConnectionPool, KeyedPool};
pub use session::{
    SSH_FX_BAD_MESSAGE, SSH_FX_FAILURE, SSH_FX_NO_SUCH_FILE, SSH_FX_OP_UNSUPPORTED,
    SSH_FX_PERMISSION_DENIED, SshSftpConnection, SshSftpFactory,
};
pub use stream::{BoxedReader, ContentStream};
pub use translate::{ConnectionErrorMapping, UNKNOWN_CONNECTION_ERROR_CODE, translate};
pub use types::{
    ConnectionKey, Protocol, RequestAttributes, RetrievalResult, TransferRequest, attributes,
};
pub use utils::{
    PATH_SEPARATOR, build_destination_path, extract_sftp_error_code, is_positive_reply,
    normalize_source_path,
};

// Re-export commonly used external types for convenience
pub use async_trait::async_trait;
