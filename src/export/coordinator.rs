//! Export coordinator
//!
//! Resolves [`ExportOptions`] into a [`CsvStream`], and drives a stream into
//! an async sink for exports that have a destination.

use std::path::Path;

use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::ExportSettings;
use crate::error::{ExportableError, Result};
use crate::schema::DescriptorMapping;

use super::options::ExportOptions;
use super::pipeline::{CsvStream, ExportSummary};
use super::source::ExportSource;
use super::writers::create_writer;

/// Result of an export written to a sink
#[derive(Debug)]
pub struct Exported<W> {
    /// The sink, flushed
    pub sink: W,
    /// Export statistics
    pub summary: ExportSummary,
}

/// Build the CSV stream for an export
///
/// The `exportables` option, when given, is used instead of `mapping`.
/// `filter` and `sort` are ignored here; they are consumed by model exports
/// when building the source.
pub fn export_csv(
    source: ExportSource,
    mapping: &DescriptorMapping,
    settings: &ExportSettings,
    options: ExportOptions,
) -> CsvStream {
    let ExportOptions {
        exportables,
        on_complete,
        cancel,
        ..
    } = options;

    let mapping = match &exportables {
        Some(overridden) => {
            debug!("Using overridden exportables: {:?}", overridden.paths());
            overridden
        }
        None => mapping,
    };

    let mut stream = CsvStream::new(source, mapping, settings);
    stream.set_completion(on_complete);
    match cancel {
        Some(token) => stream.with_cancellation(token),
        None => stream,
    }
}

/// Run an export into `sink`
///
/// # Returns
/// * `Result<Exported<W>>` - Flushed sink and statistics, or the first error
///   from the pipeline or the sink
pub async fn export_csv_to<W>(
    source: ExportSource,
    mapping: &DescriptorMapping,
    settings: &ExportSettings,
    options: ExportOptions,
    sink: W,
) -> Result<Exported<W>>
where
    W: AsyncWrite + Unpin + Send,
{
    write_csv(export_csv(source, mapping, settings, options), sink).await
}

/// Run an export into a new file at `path`
pub async fn export_csv_to_file(
    source: ExportSource,
    mapping: &DescriptorMapping,
    settings: &ExportSettings,
    options: ExportOptions,
    path: &Path,
) -> Result<ExportSummary> {
    let file = create_writer(path).await?;
    info!("Exporting CSV to {}", path.display());
    let exported = export_csv_to(source, mapping, settings, options, file).await?;
    Ok(exported.summary)
}

/// Drive `stream` into `sink`
///
/// The completion callback of the stream is fired here, exactly once, so
/// sink failures reach it as well as pipeline failures.
pub async fn write_csv<W>(mut stream: CsvStream, mut sink: W) -> Result<Exported<W>>
where
    W: AsyncWrite + Unpin + Send,
{
    let on_complete = stream.take_completion();
    let outcome = pump(&mut stream, &mut sink).await;
    stream.close();
    let summary = stream.summary().clone();

    match outcome {
        Ok(()) => {
            if let Some(callback) = on_complete {
                callback(Ok(&summary));
            }
            Ok(Exported { sink, summary })
        }
        Err(e) => {
            if let Some(callback) = on_complete {
                callback(Err(&e));
            }
            Err(e)
        }
    }
}

async fn pump<W>(stream: &mut CsvStream, sink: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        sink.write_all(&chunk).await.map_err(ExportableError::Sink)?;
    }
    sink.flush().await.map_err(ExportableError::Sink)?;
    Ok(())
}
