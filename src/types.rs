use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::RetrievalError;
use crate::stream::ContentStream;

/// Names of the attributes a request is described by
pub mod attributes {
    pub const SOURCE_FILE: &str = "srcFile";
    pub const SOURCE_DIRECTORY: &str = "srcDir";
    pub const DESTINATION_FILE: &str = "destFile";
    pub const DESTINATION_DIRECTORY: &str = "destDir";
    pub const TARGET_IP_ADDRESS: &str = "ipAddress";
    pub const TARGET_PORT: &str = "port";
    pub const SECURE_FTP: &str = "secureFtp";
    pub const TARGET_USERNAME: &str = "username";
    pub const TARGET_PASSWORD: &str = "password";
    /// Set on success: redacted form of the key the connection was borrowed with
    pub const CONNECTION_KEY: &str = "connectionKey";
    /// Set on success: where the caller should store the content
    pub const DESTINATION_PATH: &str = "fileName";
}

/// Flat set of named attributes describing one retrieval request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestAttributes {
    inner: HashMap<String, String>,
}

impl RequestAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.inner.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Returns the attribute or a malformed-request error naming it
    pub(crate) fn require(&self, name: &str) -> Result<&str, RetrievalError> {
        self.get(name).ok_or_else(|| {
            RetrievalError::malformed(format!(
                "The {name} header was not specified on the incoming message of the exchange"
            ))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestAttributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Wire protocol a request is served over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Ftp,
    Sftp,
}

impl Protocol {
    /// Reads a boolean-like security flag: `"true"` in any case selects SFTP,
    /// every other value selects plain FTP
    pub fn from_flag(flag: &str) -> Self {
        if flag.eq_ignore_ascii_case("true") {
            Protocol::Sftp
        } else {
            Protocol::Ftp
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Sftp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ftp => f.write_str("ftp"),
            Protocol::Sftp => f.write_str("sftp"),
        }
    }
}

/// Identifies the class of pooled connections a request may draw from
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    secure: bool,
}

impl ConnectionKey {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: Option<String>,
        password: Option<String>,
        secure: bool,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username,
            password,
            secure,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Copy of the key with both credential fields cleared
    pub fn without_credentials(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            username: None,
            password: None,
            secure: self.secure,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (secure={})", self.host, self.port, self.secure)
    }
}

// The password never reaches a log line.
impl fmt::Debug for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionKey")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("secure", &self.secure)
            .finish()
    }
}

/// Everything needed to perform one retrieval
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_dir: String,
    pub source_file: String,
    pub dest_dir: String,
    pub dest_file: String,
    pub connection_key: ConnectionKey,
}

impl TransferRequest {
    /// Assembles the request from its attributes.
    ///
    /// The `username` and `password` attributes are removed from `attrs` once
    /// the connection key holds them.
    pub fn from_attributes(attrs: &mut RequestAttributes) -> Result<Self, RetrievalError> {
        let source_dir = attrs.require(attributes::SOURCE_DIRECTORY)?.to_string();
        let source_file = attrs.require(attributes::SOURCE_FILE)?.to_string();
        let dest_dir = attrs.require(attributes::DESTINATION_DIRECTORY)?.to_string();
        let dest_file = attrs.require(attributes::DESTINATION_FILE)?.to_string();
        let host = attrs.require(attributes::TARGET_IP_ADDRESS)?.to_string();
        let port_attr = attrs.require(attributes::TARGET_PORT)?;
        let port = port_attr.trim().parse::<u16>().map_err(|e| {
            RetrievalError::malformed(format!("The port header [{port_attr}] is not a valid port"))
                .with_cause(e)
        })?;
        let secure = attrs
            .get(attributes::SECURE_FTP)
            .map(Protocol::from_flag)
            .unwrap_or(Protocol::Ftp)
            .is_secure();

        let username = attrs.remove(attributes::TARGET_USERNAME);
        let password = attrs.remove(attributes::TARGET_PASSWORD);

        Ok(Self {
            source_dir,
            source_file,
            dest_dir,
            dest_file,
            connection_key: ConnectionKey::new(host, port, username, password, secure),
        })
    }
}

/// Content of a retrieved file and where the caller should put it
#[derive(Debug)]
pub struct RetrievalResult {
    /// Lazily read file content; dropping it hands the connection back
    pub content: ContentStream,
    pub destination_path: String,
    /// Key the connection was borrowed with, credentials removed
    pub connection_key: ConnectionKey,
    pub protocol: Protocol,
}
