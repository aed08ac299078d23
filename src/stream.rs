use bytes::Bytes;
use futures_util::Stream;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::io::ReaderStream;

/// Boxed reader produced by a protocol connection for one remote file
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// Called once with `true` when the content was read to the end, `false` otherwise
pub(crate) type ReleaseHook = Box<dyn FnOnce(bool) + Send>;

/// Lazily read content of a remote file.
///
/// The stream is opened against a pooled connection. Dropping it gives that
/// connection back: to the pool when the content was read to EOF, or to be
/// discarded when the transfer was abandoned half way.
pub struct ContentStream {
    reader: BoxedReader,
    eof: bool,
    on_close: Option<ReleaseHook>,
}

impl ContentStream {
    /// Wraps a reader that is not tied to any pooled connection
    pub fn new(reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            reader: Box::pin(reader),
            eof: false,
            on_close: None,
        }
    }

    pub(crate) fn with_release(reader: BoxedReader, on_close: ReleaseHook) -> Self {
        Self {
            reader,
            eof: false,
            on_close: Some(on_close),
        }
    }

    /// Whether the reader has reported end of file
    pub fn is_complete(&self) -> bool {
        self.eof
    }

    /// Reads the remaining content into memory and hands the connection back
    pub async fn read_to_end(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::new();
        AsyncReadExt::read_to_end(&mut self, &mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Closes the stream, handing the connection back
    pub fn finish(self) {}

    /// Turns the content into a stream of chunks of at most `chunk_size` bytes
    pub fn into_byte_stream(self, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>> {
        ReaderStream::with_capacity(self, chunk_size)
    }
}

impl AsyncRead for ContentStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let this = &mut *self;
        match this.reader.as_mut().poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.remaining() > 0 && buf.filled().len() == before {
                    this.eof = true;
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl Drop for ContentStream {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close(self.eof);
        }
    }
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("eof", &self.eof)
            .field("pooled", &self.on_close.is_some())
            .finish()
    }
}
