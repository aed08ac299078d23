use std::time::Duration;

/// Separator used for remote and destination paths
pub const PATH_SEPARATOR: char = '/';

/// Joins a source directory and file name with exactly one separator between them,
/// whichever side already carries one.
///
/// ```
/// use eftp::normalize_source_path;
///
/// assert_eq!(normalize_source_path("/a/b", "c.txt"), "/a/b/c.txt");
/// assert_eq!(normalize_source_path("/a/b/", "/c.txt"), "/a/b/c.txt");
/// ```
pub fn normalize_source_path(dir: &str, file: &str) -> String {
    match (dir.ends_with(PATH_SEPARATOR), file.starts_with(PATH_SEPARATOR)) {
        (true, true) => format!("{}{}", &dir[..dir.len() - PATH_SEPARATOR.len_utf8()], file),
        (true, false) | (false, true) => format!("{dir}{file}"),
        (false, false) => format!("{dir}{PATH_SEPARATOR}{file}"),
    }
}

/// Builds the destination path handed back to the caller.
///
/// A separator is added after `dir` unless it already ends with one. When `dir`
/// starts with a separator, the leading character of the result is dropped:
/// `("/tmp", "f.txt")` gives `"tmp/f.txt"`.
pub fn build_destination_path(dir: &str, file: &str) -> String {
    let mut path = String::with_capacity(dir.len() + file.len() + 1);
    path.push_str(dir);
    if !dir.ends_with(PATH_SEPARATOR) {
        path.push(PATH_SEPARATOR);
    }
    path.push_str(file);
    if dir.starts_with(PATH_SEPARATOR) {
        path.remove(0);
    }
    path
}

/// Reads the leading status code out of an SFTP failure's string form,
/// `"<code>: <message>"`
pub fn extract_sftp_error_code(error: &str) -> Option<i32> {
    let (code, _) = error.split_once(':')?;
    code.trim().parse().ok()
}

/// Whether an FTP reply code is positive preliminary (1xx), positive
/// completion (2xx) or positive intermediate (3xx)
pub fn is_positive_reply(code: i32) -> bool {
    (100..400).contains(&code)
}

/// How often a pooled SSH session is probed while its SFTP channel is alive
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Probes the SSH session behind an SFTP channel until the probe fails, so the
/// channel notices a dropped connection and fails its pending requests.
pub(crate) fn check_connection<'session>(
    session: &'session openssh::Session,
) -> std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<(), openssh::Error>> + Send + Sync + 'session>,
> {
    Box::pin(async move {
        loop {
            tokio::time::sleep(SESSION_CHECK_INTERVAL).await;
            session.check().await?;
        }
        #[allow(unreachable_code)]
        Ok(())
    })
}
