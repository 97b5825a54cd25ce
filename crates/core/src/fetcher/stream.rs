use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::sandbox::SandboxDirectory;

/// Streams a file that lives inside a sandbox and removes the sandbox when
/// the stream is dropped, whether or not it was read to the end.
pub struct SandboxFileStream {
    // Field order matters: the file closes before the directory is removed.
    inner: ReaderStream<File>,
    _sandbox: SandboxDirectory,
}

impl SandboxFileStream {
    pub fn new(file: File, sandbox: SandboxDirectory) -> Self {
        Self {
            inner: ReaderStream::new(file),
            _sandbox: sandbox,
        }
    }
}

impl Stream for SandboxFileStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
