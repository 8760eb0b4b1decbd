//! The external publishing step that receives a finished artifact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::CaptureError;

/// Combined stdout/stderr of a successful publish, kept for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutput {
    pub output: String,
}

#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Hand over `artifact`. `occurrence` is the human-readable start time.
    async fn publish(&self, artifact: &Path, title: &str, occurrence: &str) -> Result<PublishOutput, CaptureError>;
}

/// Runs an executable as `<program> <artifact> <title> <occurrence>`.
#[derive(Debug, Clone)]
pub struct ScriptPublisher {
    program: PathBuf,
}

impl ScriptPublisher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl Publisher for ScriptPublisher {
    async fn publish(&self, artifact: &Path, title: &str, occurrence: &str) -> Result<PublishOutput, CaptureError> {
        let output = tokio::process::Command::new(&self.program)
            .arg(artifact)
            .arg(title)
            .arg(occurrence)
            .kill_on_drop(true)
            .output()
            .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(PublishOutput { output: combined })
        } else {
            Err(CaptureError::Publish { status: output.status.to_string(), output: combined })
        }
    }
}

#[cfg(all(test, unix))]
mod test {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("recs4m-publisher-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("upload.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn passes_three_positional_arguments() {
        let script = write_script(r#"echo "file=$1 title=$2 at=$3"; echo warn >&2"#);
        let publisher = ScriptPublisher::new(&script);

        let out = publisher
            .publish(Path::new("/tmp/a.mp3"), "Morning Show", "Mon, 06 May 2024 10:00:00")
            .await
            .unwrap();
        assert_eq!(out.output, "file=/tmp/a.mp3 title=Morning Show at=Mon, 06 May 2024 10:00:00\nwarn\n");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_the_output() {
        let script = write_script("echo quota exceeded; exit 3");
        let publisher = ScriptPublisher::new(&script);

        let err = publisher.publish(Path::new("/tmp/a.mp3"), "t", "o").await.unwrap_err();
        match err {
            CaptureError::Publish { output, .. } => assert_eq!(output, "quota exceeded\n"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let publisher = ScriptPublisher::new("/nonexistent/recs4m-upload");
        let err = publisher.publish(Path::new("/tmp/a.mp3"), "t", "o").await.unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)), "{err}");
    }
}
