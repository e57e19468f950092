//! Shared test harness for integration tests.
//!
//! Provides [`MockEncoder`], a scriptable [`Encoder`] that writes a small
//! file instead of running ffmpeg, and [`TestHarness`], which wires it into an
//! [`Orchestrator`] over a temp directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vidconv::batch::Orchestrator;
use vidconv_av::{
    Container, ConversionOptions, EncodeOutcome, EncodeRequest, Encoder, Error, ProgressCallback,
    Result,
};
use vidconv_common::JobId;

/// Encoder double: checks the source exists, waits `delay`, writes the target.
#[derive(Default)]
pub struct MockEncoder {
    /// Time each conversion takes.
    pub delay: Duration,
    /// Fail preflight as if ffmpeg were missing.
    pub preflight_fails: bool,
    /// Report a missing ffmpeg on this call (0-based).
    pub tool_vanishes_on_call: Option<usize>,
    calls: AtomicUsize,
}

impl MockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Preflight fails as if ffmpeg were missing.
    pub fn failing_preflight() -> Self {
        Self {
            preflight_fails: true,
            ..Self::default()
        }
    }

    /// ffmpeg disappears on the given call (0-based).
    pub fn tool_vanishes_on(call: usize) -> Self {
        Self {
            tool_vanishes_on_call: Some(call),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn preflight(&self) -> Result<()> {
        if self.preflight_fails {
            return Err(Error::tool_not_found("ffmpeg"));
        }
        Ok(())
    }

    async fn convert(
        &self,
        request: &EncodeRequest,
        progress: ProgressCallback,
        cancel: CancellationToken,
    ) -> Result<EncodeOutcome> {
        let started = Instant::now();
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        if self.tool_vanishes_on_call == Some(call) {
            return Err(Error::tool_not_found("ffmpeg"));
        }

        if std::fs::File::open(&request.source).is_err() {
            return Err(Error::input(&request.source, "source file does not exist"));
        }

        if request.target.exists() && !request.options.overwrite {
            return Err(Error::output(&request.target, "target already exists"));
        }

        progress(0.0, "encoding");
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        progress(50.0, "encoding");

        let contents = format!("converted from {}", request.source.display());
        std::fs::write(&request.target, &contents)
            .map_err(|e| Error::output(&request.target, e.to_string()))?;
        progress(100.0, "done");

        Ok(EncodeOutcome {
            output: request.target.clone(),
            bytes_written: contents.len() as u64,
            elapsed: started.elapsed(),
        })
    }
}

/// An orchestrator over a [`MockEncoder`] and a scratch directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub encoder: Arc<MockEncoder>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_encoder(MockEncoder::new())
    }

    pub fn with_encoder(encoder: MockEncoder) -> Self {
        let encoder = Arc::new(encoder);
        let orchestrator = Orchestrator::new(encoder.clone());
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
            encoder,
            orchestrator,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create a source file with some bytes in it.
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, b"not really video").expect("failed to write source");
        path
    }

    /// Queue `source` for conversion to `<stem>.mp4` in the scratch directory.
    pub fn enqueue_mp4(&self, source: &Path) -> JobId {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let target = self.path(&format!("{stem}.mp4"));
        self.orchestrator
            .enqueue(source, target, ConversionOptions::new(Container::Mp4))
            .expect("enqueue failed")
    }
}
