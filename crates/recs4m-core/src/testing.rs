//! Fakes shared by the capture and scheduler tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone};
use futures::stream;

use crate::error::CaptureError;
use crate::publisher::{PublishOutput, Publisher};
use crate::source::{AudioSource, ByteStream};

/// 2024-05-06 is a Monday.
pub(crate) fn jst_monday(hour: u32, minute: u32, second: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(9 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 5, 6, hour, minute, second)
        .unwrap()
}

pub(crate) fn artifact_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("recs4m-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    /// Chunk `k` (four bytes of value `k`) every `interval`, forever.
    Ticking { interval: Duration },
    /// Like `Ticking`, but chunk `fail_at` is a read error.
    FailingAfter { interval: Duration, fail_at: u32 },
    /// Like `Ticking`, but the stream ends after `last`.
    Finite { interval: Duration, last: u32 },
    /// Like `Ticking`, but reading chunk `panic_at` panics.
    PanickingAt { interval: Duration, panic_at: u32 },
    /// Accepts the connection and never sends anything.
    Stalled,
    Status(u16),
}

#[derive(Debug)]
pub(crate) struct FakeSource {
    behaviour: Behaviour,
    opened: Mutex<u32>,
}

impl FakeSource {
    fn with(behaviour: Behaviour) -> Self {
        Self { behaviour, opened: Mutex::new(0) }
    }

    pub(crate) fn ticking(interval: Duration) -> Self {
        Self::with(Behaviour::Ticking { interval })
    }

    pub(crate) fn failing_after(interval: Duration, fail_at: u32) -> Self {
        Self::with(Behaviour::FailingAfter { interval, fail_at })
    }

    pub(crate) fn finite(interval: Duration, last: u32) -> Self {
        Self::with(Behaviour::Finite { interval, last })
    }

    pub(crate) fn panicking_at(interval: Duration, panic_at: u32) -> Self {
        Self::with(Behaviour::PanickingAt { interval, panic_at })
    }

    pub(crate) fn stalled() -> Self {
        Self::with(Behaviour::Stalled)
    }

    pub(crate) fn status(code: u16) -> Self {
        Self::with(Behaviour::Status(code))
    }

    pub(crate) fn times_opened(&self) -> u32 {
        *self.opened.lock().unwrap()
    }
}

fn ticks(interval: Duration, fail_at: Option<u32>, last: Option<u32>, panic_at: Option<u32>) -> ByteStream {
    Box::pin(stream::unfold(1u32, move |k| async move {
        if last.is_some_and(|last| k > last) {
            return None;
        }
        tokio::time::sleep(interval).await;
        if panic_at == Some(k) {
            panic!("source exploded at chunk {k}");
        }
        if fail_at == Some(k) {
            let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
            return Some((Err(CaptureError::Io(err)), k + 1));
        }
        Some((Ok(Bytes::from(vec![k as u8; 4])), k + 1))
    }))
}

#[async_trait]
impl AudioSource for FakeSource {
    async fn open(&self) -> Result<ByteStream, CaptureError> {
        *self.opened.lock().unwrap() += 1;
        match self.behaviour {
            Behaviour::Ticking { interval } => Ok(ticks(interval, None, None, None)),
            Behaviour::FailingAfter { interval, fail_at } => Ok(ticks(interval, Some(fail_at), None, None)),
            Behaviour::Finite { interval, last } => Ok(ticks(interval, None, Some(last), None)),
            Behaviour::PanickingAt { interval, panic_at } => Ok(ticks(interval, None, None, Some(panic_at))),
            Behaviour::Stalled => Ok(Box::pin(stream::pending())),
            Behaviour::Status(code) => Err(CaptureError::Status(code)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PublishCall {
    pub path: PathBuf,
    pub title: String,
    pub occurrence: String,
    /// Artifact bytes as seen at publish time.
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
enum PublishMode {
    Succeed,
    Fail(&'static str),
    Panic,
}

#[derive(Debug)]
pub(crate) struct RecordingPublisher {
    mode: PublishMode,
    calls: Mutex<Vec<PublishCall>>,
}

impl RecordingPublisher {
    fn with(mode: PublishMode) -> Self {
        Self { mode, calls: Mutex::new(Vec::new()) }
    }

    pub(crate) fn succeeding() -> Self {
        Self::with(PublishMode::Succeed)
    }

    pub(crate) fn failing(output: &'static str) -> Self {
        Self::with(PublishMode::Fail(output))
    }

    pub(crate) fn panicking() -> Self {
        Self::with(PublishMode::Panic)
    }

    pub(crate) fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, artifact: &Path, title: &str, occurrence: &str) -> Result<PublishOutput, CaptureError> {
        if let PublishMode::Panic = self.mode {
            panic!("publisher exploded");
        }
        let content = std::fs::read(artifact)?;
        self.calls.lock().unwrap().push(PublishCall {
            path: artifact.to_path_buf(),
            title: title.to_owned(),
            occurrence: occurrence.to_owned(),
            content,
        });
        match self.mode {
            PublishMode::Fail(output) => Err(CaptureError::Publish {
                status: "exit status: 1".into(),
                output: output.into(),
            }),
            _ => Ok(PublishOutput::default()),
        }
    }
}
