use crate::types::{RequestAttributes, RetrievalResult, attributes};

/// Retrieval over plain FTP, failures detected from reply codes
pub(crate) mod ftp;

/// Retrieval over SFTP, failures detected from raised errors
pub(crate) mod sftp;

/// Writes the outcome of a successful retrieval back onto the request
pub(crate) fn publish_result(attrs: &mut RequestAttributes, result: &RetrievalResult) {
    attrs.insert(attributes::DESTINATION_PATH, result.destination_path.clone());
    attrs.insert(attributes::CONNECTION_KEY, result.connection_key.to_string());
}
