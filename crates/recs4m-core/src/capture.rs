//! One timed capture of one reservation occurrence.
//!
//! A [`CaptureTask`] walks through
//! `Waiting → Streaming → Buffering → Finalizing → Publishing` and ends in a
//! [`CaptureOutcome`]. The pipeline runs in its own tokio task under a small
//! supervisor task; the supervisor owns the dedup [`MarkGuard`] and writes
//! the single terminal activity-log entry, so both happen even when the
//! pipeline panics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::dedup::MarkGuard;
use crate::error::CaptureError;
use crate::publisher::Publisher;
use crate::reservation::{format_occurrence, LogEntry, Reservation};
use crate::source::{AudioSource, ByteStream};
use crate::store::ActivityLog;

/// Extension given to a finished artifact.
pub const ARTIFACT_EXTENSION: &str = "mp3";

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// How long before the occurrence the stream is opened.
    pub pre_roll: Duration,
    /// Bytes read before `occurrence + warm_up` are discarded.
    pub warm_up: Duration,
    /// Longest gap tolerated between two chunks; `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Where temporary and finished artifacts are written.
    pub artifact_dir: PathBuf,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            pre_roll: Duration::from_secs(30),
            warm_up: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            artifact_dir: std::env::temp_dir(),
        }
    }
}

/// Collaborators shared by every capture task.
pub struct CaptureContext<L> {
    pub source: Arc<dyn AudioSource>,
    pub publisher: Arc<dyn Publisher>,
    pub log: Arc<L>,
    pub clock: Arc<dyn Clock>,
    pub settings: CaptureSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    Scheduled,
    Waiting,
    Streaming,
    Buffering,
    Finalizing,
    Publishing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Succeeded {
        artifact: PathBuf,
        bytes: u64,
    },
    /// `phase` is `None` when the pipeline panicked.
    Failed {
        phase: Option<CapturePhase>,
        reason: String,
    },
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureOutcome::Succeeded { .. })
    }
}

#[derive(Debug)]
struct CaptureFailure {
    phase: CapturePhase,
    error: CaptureError,
}

fn at(phase: CapturePhase) -> impl FnOnce(CaptureError) -> CaptureFailure {
    move |error| CaptureFailure { phase, error }
}

pub struct CaptureTask<L> {
    reservation: Reservation,
    occurrence: DateTime<FixedOffset>,
    ctx: Arc<CaptureContext<L>>,
}

impl<L: ActivityLog> CaptureTask<L> {
    pub fn new(reservation: Reservation, occurrence: DateTime<FixedOffset>, ctx: Arc<CaptureContext<L>>) -> Self {
        Self { reservation, occurrence, ctx }
    }

    /// Spawn the capture. `guard` is released once the terminal log entry
    /// has been written.
    pub fn spawn(self, guard: MarkGuard) -> JoinHandle<CaptureOutcome> {
        let span = info_span!(
            "capture",
            reservation_id = %self.reservation.id,
            occurrence = %self.occurrence,
        );
        span.in_scope(|| debug!(phase = ?CapturePhase::Scheduled, "capture scheduled"));
        tokio::spawn(
            async move {
                let _guard = guard;
                let ctx = Arc::clone(&self.ctx);
                let title = self.reservation.title.clone();
                let occurrence = format_occurrence(&self.occurrence);
                let partial = ctx
                    .settings
                    .artifact_dir
                    .join(format!("recs4m-{}.part", Uuid::new_v4()));

                let pipeline = tokio::spawn(self.run(partial.clone()).in_current_span());
                let outcome = match pipeline.await {
                    Ok(Ok((artifact, bytes))) => {
                        info!(artifact = %artifact.display(), bytes, "capture published");
                        CaptureOutcome::Succeeded { artifact, bytes }
                    }
                    Ok(Err(failure)) => {
                        error!(phase = ?failure.phase, error = %failure.error, "capture failed");
                        CaptureOutcome::Failed { phase: Some(failure.phase), reason: failure.error.to_string() }
                    }
                    Err(join_err) => {
                        let reason = if join_err.is_panic() {
                            let payload = join_err.into_panic();
                            let msg = payload
                                .downcast_ref::<&str>()
                                .map(|s| (*s).to_owned())
                                .or_else(|| payload.downcast_ref::<String>().cloned())
                                .unwrap_or_else(|| "unknown panic".to_owned());
                            CaptureError::Panicked(msg).to_string()
                        } else {
                            "capture task was cancelled".to_owned()
                        };
                        error!(reason = %reason, "capture aborted");
                        discard(&partial).await;
                        CaptureOutcome::Failed { phase: None, reason }
                    }
                };

                let message = match &outcome {
                    CaptureOutcome::Succeeded { .. } => {
                        format!("Successfully recorded and uploaded: {title}(from: {occurrence})")
                    }
                    CaptureOutcome::Failed { reason, .. } => {
                        format!("Failed: {title}(from: {occurrence}, reason: {reason})")
                    }
                };
                append(&ctx, message).await;
                outcome
            }
            .instrument(span),
        )
    }

    /// `partial` is the temporary file the window is buffered into; it is
    /// renamed to the artifact once complete.
    async fn run(self, partial: PathBuf) -> Result<(PathBuf, u64), CaptureFailure> {
        let settings = &self.ctx.settings;

        debug!(phase = ?CapturePhase::Waiting, "waiting for pre-roll");
        let wake_at = self.occurrence - to_chrono(settings.pre_roll);
        let wait = (wake_at - self.ctx.clock.now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        debug!(phase = ?CapturePhase::Streaming, "opening audio source");
        let stream = self.ctx.source.open().await.map_err(at(CapturePhase::Streaming))?;
        append(
            &self.ctx,
            format!(
                "Recording started: {}(from: {})",
                self.reservation.title,
                format_occurrence(&self.occurrence)
            ),
        )
        .await;

        debug!(phase = ?CapturePhase::Buffering, path = %partial.display(), "buffering window");
        let bytes = match self.buffer(stream, &partial).await {
            Ok(n) => n,
            Err(error) => {
                discard(&partial).await;
                return Err(CaptureFailure { phase: CapturePhase::Buffering, error });
            }
        };

        debug!(phase = ?CapturePhase::Finalizing, bytes, "finalizing artifact");
        let artifact = partial.with_extension(ARTIFACT_EXTENSION);
        if let Err(e) = tokio::fs::rename(&partial, &artifact).await {
            discard(&partial).await;
            return Err(CaptureFailure { phase: CapturePhase::Finalizing, error: e.into() });
        }

        debug!(phase = ?CapturePhase::Publishing, artifact = %artifact.display(), "publishing");
        let published = self
            .ctx
            .publisher
            .publish(&artifact, &self.reservation.title, &format_occurrence(&self.occurrence))
            .await
            .map_err(at(CapturePhase::Publishing))?;
        if !published.output.is_empty() {
            debug!(output = %published.output, "publisher output");
        }

        Ok((artifact, bytes))
    }

    /// Write the in-window part of `stream` to a fresh file at `path`.
    ///
    /// Chunks read before `occurrence + warm_up` are dropped; the first chunk
    /// read at or after `occurrence + duration` ends the capture.
    async fn buffer(&self, mut stream: ByteStream, path: &Path) -> Result<u64, CaptureError> {
        let record_from = self.occurrence + to_chrono(self.ctx.settings.warm_up);
        let record_until = self.occurrence + self.reservation.duration();
        let read_timeout = self.ctx.settings.read_timeout;

        let mut writer = BufWriter::new(tokio::fs::File::create(path).await?);
        let mut written = 0u64;

        loop {
            let next = match read_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| CaptureError::ReadTimeout(limit))?,
                None => stream.next().await,
            };
            let chunk = next.ok_or(CaptureError::StreamEnded)??;

            let now = self.ctx.clock.now();
            if now < record_from {
                continue;
            }
            if now >= record_until {
                break;
            }
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        Ok(written)
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

async fn append<L: ActivityLog>(ctx: &CaptureContext<L>, message: String) {
    let entry = LogEntry::new(ctx.clock.now(), message);
    if let Err(e) = ctx.log.append_log(entry).await {
        warn!(error = %e, "failed to append activity log entry");
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
        }
    }
}
