//! Pull-based CSV export stream
//!
//! [`CsvStream`] chains the stages of one export: open the source with the
//! mapping's projection, transform each record into an output row, and encode
//! the row as CSV. Nothing runs until the consumer polls, and each poll pulls
//! at most one record from the source, so a slow consumer slows the cursor
//! down instead of buffering records.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Instant;

use futures::stream::{self, BoxStream, FusedStream};
use futures::{Stream, StreamExt, TryStreamExt, future};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, info, warn};

use crate::config::ExportSettings;
use crate::error::{ExportableError, Result};
use crate::schema::DescriptorMapping;

use super::source::ExportSource;
use super::transform::RecordTransformer;
use super::writers::CsvSerializer;

/// Outcome handed to a completion callback
pub type Completion<'a> = std::result::Result<&'a ExportSummary, &'a ExportableError>;

/// Callback invoked exactly once when an export ends
pub type CompletionCallback = Box<dyn FnOnce(Completion<'_>) + Send>;

/// Statistics of a finished export
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Records pulled from the source
    pub records: u64,
    /// CSV bytes produced, header included
    pub bytes: u64,
    /// Time from first poll to completion
    pub elapsed_ms: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// Stream of CSV chunks for one export
///
/// Yields the header together with the first row, then one chunk per record.
/// Errors end the stream: with a completion callback the error goes to the
/// callback and the stream just ends, otherwise it is the final item.
pub struct CsvStream {
    inner: Option<BoxStream<'static, Result<Vec<u8>>>>,
    cancel: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
    on_complete: Option<CompletionCallback>,
    summary: ExportSummary,
    started: Option<Instant>,
    progress_interval: u64,
    finished: bool,
}

impl CsvStream {
    /// Build the export pipeline
    ///
    /// # Arguments
    /// * `source` - Records to export; opened lazily on first poll
    /// * `mapping` - Exportable fields
    /// * `settings` - Delimiter, escaping and progress settings
    pub fn new(source: ExportSource, mapping: &DescriptorMapping, settings: &ExportSettings) -> Self {
        let projection = mapping.projection();
        info!(
            "Preparing CSV export from {} source with {} fields",
            source.kind(),
            mapping.len()
        );
        debug!("Export projection: {:?}", projection);

        let inner = match settings.delimiter_byte() {
            Ok(delimiter) => {
                let transformer = RecordTransformer::new(mapping, settings.escape);
                let mut serializer = CsvSerializer::new(delimiter);

                stream::once(source.open(projection))
                    .try_flatten()
                    .map(move |record| {
                        let row = transformer.transform(&record?)?;
                        serializer.serialize(&row)
                    })
                    .boxed()
            }
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        };

        Self {
            inner: Some(inner),
            cancel: None,
            on_complete: None,
            summary: ExportSummary::default(),
            started: None,
            progress_interval: settings.progress_interval,
            finished: false,
        }
    }

    /// Register the completion callback
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Completion<'_>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Set cancellation token for this export
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(Box::pin(token.cancelled_owned()));
        self
    }

    /// Statistics so far (final once the stream has ended)
    pub fn summary(&self) -> &ExportSummary {
        &self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn set_completion(&mut self, callback: Option<CompletionCallback>) {
        self.on_complete = callback;
    }

    pub(crate) fn take_completion(&mut self) -> Option<CompletionCallback> {
        self.on_complete.take()
    }

    /// Stop without reporting; used when the consumer failed, not the pipeline
    pub(crate) fn close(&mut self) {
        self.inner = None;
        self.cancel = None;
        self.finished = true;
        self.record_elapsed();
    }

    fn record_elapsed(&mut self) {
        if let Some(started) = self.started {
            self.summary.elapsed_ms = started.elapsed().as_millis() as u64;
        }
    }

    /// End the export and report the outcome
    ///
    /// # Returns
    /// The error when there is no callback to hand it to.
    fn finish(&mut self, outcome: Result<()>) -> Option<ExportableError> {
        self.close();

        match &outcome {
            Ok(()) => info!(
                "CSV export {}: {} records, {} bytes in {}ms",
                if self.summary.cancelled { "cancelled" } else { "finished" },
                self.summary.records,
                self.summary.bytes,
                self.summary.elapsed_ms
            ),
            Err(e) => warn!("CSV export failed after {} records: {}", self.summary.records, e),
        }

        match (self.on_complete.take(), outcome) {
            (Some(callback), Ok(())) => {
                callback(Ok(&self.summary));
                None
            }
            (Some(callback), Err(e)) => {
                callback(Err(&e));
                None
            }
            (None, Ok(())) => None,
            (None, Err(e)) => Some(e),
        }
    }
}

impl Stream for CsvStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }
        this.started.get_or_insert_with(Instant::now);

        if let Some(cancel) = this.cancel.as_mut() {
            if cancel.as_mut().poll(cx).is_ready() {
                info!("Export operation cancelled");
                this.summary.cancelled = true;
                this.finish(Ok(()));
                return Poll::Ready(None);
            }
        }

        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    this.summary.records += 1;
                    if this.progress_interval > 0
                        && this.summary.records % this.progress_interval == 0
                    {
                        info!("Exported {} records", this.summary.records);
                    }

                    if chunk.is_empty() {
                        continue;
                    }
                    this.summary.bytes += chunk.len() as u64;
                    return Poll::Ready(Some(Ok(chunk)));
                }
                Some(Err(e)) => {
                    return Poll::Ready(this.finish(Err(e)).map(Err));
                }
                None => {
                    this.finish(Ok(()));
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for CsvStream {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl Drop for CsvStream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Some(callback) = self.on_complete.take() {
            warn!(
                "CSV export dropped after {} records before completion",
                self.summary.records
            );
            callback(Err(&ExportableError::Aborted));
        }
    }
}
