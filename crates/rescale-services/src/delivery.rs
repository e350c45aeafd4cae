use crate::job::{CompletedJob, PipelineError};
use crate::workspace::WorkspaceError;
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Byte stream of a Job's assembled archive.
///
/// Owns the [`CompletedJob`] for as long as the body is being sent. The
/// workspace is released once the stream reports its end or an error, or
/// when the stream is dropped early (client went away), whichever comes
/// first, and never while a read is still in flight. Release from here does
/// not wait for the removal: it runs on the blocking pool.
pub struct DeliveryStream<R = tokio::fs::File> {
    inner: ReaderStream<R>,
    job: Option<CompletedJob>,
    sent_bytes: u64,
}

impl DeliveryStream<tokio::fs::File> {
    /// Open the Job's archive file for streaming
    pub async fn open(completed: CompletedJob) -> Result<Self, PipelineError> {
        match tokio::fs::File::open(&completed.archive.path).await {
            Ok(file) => Ok(Self::from_reader(completed, file)),
            Err(source) => {
                let path = completed.archive.path.clone();
                completed.job.release().await;
                Err(WorkspaceError::Read { path, source }.into())
            }
        }
    }
}

impl<R: AsyncRead> DeliveryStream<R> {
    /// Stream the archive bytes from `reader`
    pub fn from_reader(completed: CompletedJob, reader: R) -> Self {
        Self {
            inner: ReaderStream::new(reader),
            job: Some(completed),
            sent_bytes: 0,
        }
    }
}

impl<R> DeliveryStream<R> {
    fn finish(&mut self, error: Option<&io::Error>) {
        let Some(completed) = self.job.take() else {
            return;
        };

        match error {
            None => tracing::info!(
                job_id = %completed.job.id(),
                sent_bytes = self.sent_bytes,
                elapsed_ms = completed.job.elapsed_ms() as u64,
                "Archive delivered"
            ),
            Some(e) => tracing::warn!(
                job_id = %completed.job.id(),
                sent_bytes = self.sent_bytes,
                error = %e,
                "Archive delivery failed"
            ),
        }

        completed.job.finalize();
    }
}

impl<R: AsyncRead + Unpin> Stream for DeliveryStream<R> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.job.is_none() {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.sent_bytes += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(Some(&e));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<R> Drop for DeliveryStream<R> {
    fn drop(&mut self) {
        if let Some(completed) = self.job.take() {
            tracing::warn!(
                job_id = %completed.job.id(),
                sent_bytes = self.sent_bytes,
                "Archive delivery aborted before completion"
            );
            completed.job.finalize();
        }
    }
}
