//! Failure diagnostics: per-test trace recording and artifact capture.
//!
//! Every test records a low-overhead timeline from the moment its context
//! exists. At test end the recording is resolved exactly once:
//!
//! ```text
//! Idle ──start──► Recording ──resolve(failed)──► Persisted (zip + screenshot)
//!                          └──resolve(passed)──► Discarded
//! ```
//!
//! [`ActiveCapture::resolve`] consumes the capture, so resolving twice does not
//! compile; a capture dropped without resolution discards its recording.

use crate::engine::Page;
use crate::outcome::TestOutcome;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use uuid::Uuid;

/// Timestamp layout of trace file names
pub const TRACE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Default frame budget per test
pub const DEFAULT_MAX_FRAMES: usize = 20;

/// Numbered names tried before a trace write gives up
const MAX_TRACE_NAME_ATTEMPTS: u32 = 100;

/// What the recorder captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Record DOM/URL snapshots after navigations and clicks
    pub snapshots: bool,
    /// Record viewport frames after navigations and clicks. Each frame is a
    /// screenshot round trip held in memory until the test resolves.
    pub frames: bool,
    /// Record source locations of named steps
    pub sources: bool,
    /// Maximum events to store
    pub max_events: usize,
    /// Maximum frames to store
    pub max_frames: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snapshots: true,
            frames: true,
            sources: true,
            max_events: 10_000,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl CaptureConfig {
    /// Create a new config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable frame capture
    #[must_use]
    pub const fn without_frames(mut self) -> Self {
        self.frames = false;
        self
    }

    /// Set maximum frames
    #[must_use]
    pub const fn with_max_frames(mut self, max: usize) -> Self {
        self.max_frames = max;
        self
    }
}

/// Status of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanStatus {
    /// Span is running
    Running,
    /// Span completed successfully
    Ok,
    /// Span completed with error
    Error,
    /// Span was still open when recording stopped
    Cancelled,
}

/// A timed section of the test (one page action or named step)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    /// Unique span ID
    pub id: String,
    /// Parent span ID (if nested)
    pub parent_id: Option<String>,
    /// Span name
    pub name: String,
    /// Start timestamp (ms since recording start)
    pub start_ms: u64,
    /// End timestamp (ms since recording start)
    pub end_ms: Option<u64>,
    /// Span attributes
    pub attributes: HashMap<String, String>,
    /// Span status
    pub status: SpanStatus,
}

impl TraceSpan {
    fn new(name: &str, start_ms: u64, parent_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id,
            name: name.to_string(),
            start_ms,
            end_ms: None,
            attributes: HashMap::new(),
            status: SpanStatus::Running,
        }
    }

    /// Duration once ended
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.end_ms.map(|end| end.saturating_sub(self.start_ms))
    }

    /// Check if span is complete
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.end_ms.is_some()
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    /// Informational
    Info,
    /// Warning
    Warn,
    /// Error
    Error,
}

/// A point-in-time occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Event timestamp (ms since recording start)
    pub timestamp_ms: u64,
    /// Event name
    pub name: String,
    /// Event level
    pub level: EventLevel,
    /// Event message
    pub message: String,
}

/// Location in test code that opened a named step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Step name
    pub step: String,
    /// Source file
    pub file: String,
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

/// A captured viewport image
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture time (ms since recording start)
    pub timestamp_ms: u64,
    /// Action that produced the frame
    pub label: String,
    /// PNG bytes
    pub png: Vec<u8>,
}

/// Frame entry in the archive index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEntry {
    /// Path inside the archive
    pub file: String,
    /// Capture time (ms since recording start)
    pub timestamp_ms: u64,
    /// Action that produced the frame
    pub label: String,
}

/// Metadata for a trace archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Trace ID
    pub trace_id: String,
    /// Test name
    pub test_name: String,
    /// Start time
    pub start_time: SystemTime,
    /// End time
    pub end_time: Option<SystemTime>,
    /// Total duration in ms
    pub duration_ms: Option<u64>,
    /// Harness version
    pub harness_version: String,
}

impl TraceMetadata {
    fn new(test_name: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            test_name: test_name.to_string(),
            start_time: SystemTime::now(),
            end_time: None,
            duration_ms: None,
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Stopped recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceArchive {
    /// Trace metadata
    pub metadata: TraceMetadata,
    /// All spans
    pub spans: Vec<TraceSpan>,
    /// All events
    pub events: Vec<TraceEvent>,
    /// Source references of named steps
    pub sources: Vec<SourceRef>,
    /// Frame index
    pub frames: Vec<FrameEntry>,
    /// Frame images, stored next to `trace.json` in the zip
    #[serde(skip)]
    pub frame_data: Vec<Vec<u8>>,
}

impl TraceArchive {
    /// Spans with a given name
    #[must_use]
    pub fn spans_by_name(&self, name: &str) -> Vec<&TraceSpan> {
        self.spans.iter().filter(|s| s.name == name).collect()
    }

    /// Spans that ended in error
    #[must_use]
    pub fn error_spans(&self) -> Vec<&TraceSpan> {
        self.spans
            .iter()
            .filter(|s| s.status == SpanStatus::Error)
            .collect()
    }

    /// Write the archive as a zip: `trace.json` plus `frames/NNNN.png`.
    /// Fails with `AlreadyExists` rather than replacing an existing file.
    pub fn write_zip(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("trace.json", options).map_err(archive_error)?;
        zip.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;

        for (entry, png) in self.frames.iter().zip(&self.frame_data) {
            zip.start_file(entry.file.as_str(), options)
                .map_err(archive_error)?;
            zip.write_all(png)?;
        }

        zip.finish().map_err(archive_error)?;
        Ok(())
    }
}

fn archive_error(e: zip::result::ZipError) -> HarnessError {
    HarnessError::Archive {
        message: e.to_string(),
    }
}

/// Timeline recorder for one test
#[derive(Debug)]
pub struct TraceRecorder {
    config: CaptureConfig,
    start_time: Instant,
    metadata: TraceMetadata,
    spans: Vec<TraceSpan>,
    events: Vec<TraceEvent>,
    sources: Vec<SourceRef>,
    frames: Vec<Frame>,
    current_span_id: Option<String>,
    running: bool,
}

/// Recorder shared between a test's page and its capture
pub type SharedRecorder = Arc<Mutex<TraceRecorder>>;

/// Lock a shared recorder, recovering from a poisoned lock
pub fn lock_recorder(recorder: &Mutex<TraceRecorder>) -> MutexGuard<'_, TraceRecorder> {
    recorder.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TraceRecorder {
    /// Create a new recorder
    #[must_use]
    pub fn new(test_name: &str, config: CaptureConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            metadata: TraceMetadata::new(test_name),
            spans: Vec::new(),
            events: Vec::new(),
            sources: Vec::new(),
            frames: Vec::new(),
            current_span_id: None,
            running: false,
        }
    }

    /// Start recording
    pub fn start(&mut self) {
        self.running = true;
        self.start_time = Instant::now();
        self.metadata.start_time = SystemTime::now();
    }

    /// Stop recording and return the archive
    #[must_use]
    pub fn stop(&mut self) -> TraceArchive {
        let end_ms = self.elapsed_ms();
        self.running = false;
        self.metadata.end_time = Some(SystemTime::now());
        self.metadata.duration_ms = Some(end_ms);

        for span in &mut self.spans {
            if !span.is_complete() {
                span.end_ms = Some(end_ms);
                span.status = SpanStatus::Cancelled;
            }
        }

        let frames = std::mem::take(&mut self.frames);
        let index = frames
            .iter()
            .enumerate()
            .map(|(i, f)| FrameEntry {
                file: format!("frames/{i:04}.png"),
                timestamp_ms: f.timestamp_ms,
                label: f.label.clone(),
            })
            .collect();

        TraceArchive {
            metadata: self.metadata.clone(),
            spans: std::mem::take(&mut self.spans),
            events: std::mem::take(&mut self.events),
            sources: std::mem::take(&mut self.sources),
            frames: index,
            frame_data: frames.into_iter().map(|f| f.png).collect(),
        }
    }

    /// Elapsed time in milliseconds
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Open a span nested under the current one
    pub fn start_span(&mut self, name: &str) -> String {
        let span = TraceSpan::new(name, self.elapsed_ms(), self.current_span_id.clone());
        let id = span.id.clone();
        self.current_span_id = Some(id.clone());
        self.spans.push(span);
        id
    }

    /// Close a span and restore its parent as current
    pub fn end_span(&mut self, span_id: &str) {
        let end_ms = self.elapsed_ms();
        if let Some(span) = self.spans.iter_mut().find(|s| s.id == span_id) {
            span.end_ms = Some(end_ms);
            if span.status == SpanStatus::Running {
                span.status = SpanStatus::Ok;
            }
            self.current_span_id = span.parent_id.clone();
        }
    }

    /// Mark a span as failed
    pub fn error_span(&mut self, span_id: &str, message: &str) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.id == span_id) {
            span.status = SpanStatus::Error;
            span.attributes
                .insert("error.message".to_string(), message.to_string());
        }
    }

    /// Attach an attribute to a span
    pub fn annotate(&mut self, span_id: &str, key: &str, value: &str) {
        if let Some(span) = self.spans.iter_mut().find(|s| s.id == span_id) {
            span.attributes.insert(key.to_string(), value.to_string());
        }
    }

    /// Record an event
    pub fn event(&mut self, name: &str, level: EventLevel, message: &str) {
        if self.running && self.events.len() < self.config.max_events {
            self.events.push(TraceEvent {
                timestamp_ms: self.elapsed_ms(),
                name: name.to_string(),
                level,
                message: message.to_string(),
            });
        }
    }

    /// Record a page snapshot marker (URL after an action)
    pub fn snapshot(&mut self, url: &str) {
        if self.config.snapshots {
            self.event("snapshot", EventLevel::Info, url);
        }
    }

    /// Whether another frame would be kept
    #[must_use]
    pub fn wants_frame(&self) -> bool {
        self.running && self.config.frames && self.frames.len() < self.config.max_frames
    }

    /// Record a viewport frame
    pub fn frame(&mut self, label: &str, png: Vec<u8>) {
        if self.wants_frame() {
            self.frames.push(Frame {
                timestamp_ms: self.elapsed_ms(),
                label: label.to_string(),
                png,
            });
        }
    }

    /// Record where a named step was opened
    pub fn source(&mut self, step: &str, location: &Location<'_>) {
        if self.config.sources {
            self.sources.push(SourceRef {
                step: step.to_string(),
                file: location.file().to_string(),
                line: location.line(),
                column: location.column(),
            });
        }
    }

    /// Check if recording is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Current span count
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Current event count
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Current frame count
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Lifecycle state of a test's recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    /// No recording started
    Idle,
    /// Recording in progress
    Recording,
    /// Recording written to the given path
    Persisted(PathBuf),
    /// Recording stopped without being written
    Discarded,
}

/// Result of resolving a capture at test end
#[derive(Debug, Clone)]
pub struct CaptureResolution {
    /// Final state (`Persisted` or `Discarded`)
    pub state: CaptureState,
    /// Full-page screenshot taken on failure
    pub screenshot: Option<Vec<u8>>,
}

impl CaptureResolution {
    /// Path of the persisted trace
    #[must_use]
    pub fn trace_path(&self) -> Option<&Path> {
        match &self.state {
            CaptureState::Persisted(path) => Some(path),
            _ => None,
        }
    }
}

/// Starts per-test recordings
#[derive(Debug, Clone)]
pub struct DiagnosticCapture {
    traces_dir: PathBuf,
    config: CaptureConfig,
}

impl DiagnosticCapture {
    /// Create a capture factory writing failure traces under `traces_dir`
    #[must_use]
    pub fn new(traces_dir: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            traces_dir: traces_dir.into(),
            config,
        }
    }

    /// Directory failure traces are written to
    #[must_use]
    pub fn traces_dir(&self) -> &Path {
        &self.traces_dir
    }

    /// Begin recording for a test
    #[must_use]
    pub fn start(&self, test_name: &str) -> ActiveCapture {
        let mut recorder = TraceRecorder::new(test_name, self.config.clone());
        recorder.start();
        tracing::debug!(test = test_name, "trace recording started");
        ActiveCapture {
            test_name: test_name.to_string(),
            traces_dir: self.traces_dir.clone(),
            recorder: Arc::new(Mutex::new(recorder)),
            resolved: false,
        }
    }
}

/// A recording in progress for one test
#[derive(Debug)]
pub struct ActiveCapture {
    test_name: String,
    traces_dir: PathBuf,
    recorder: SharedRecorder,
    resolved: bool,
}

impl ActiveCapture {
    /// Current state
    #[must_use]
    pub fn state(&self) -> CaptureState {
        if lock_recorder(&self.recorder).is_running() {
            CaptureState::Recording
        } else {
            CaptureState::Idle
        }
    }

    /// Handle to the recorder for page instrumentation
    #[must_use]
    pub fn recorder(&self) -> SharedRecorder {
        Arc::clone(&self.recorder)
    }

    /// Stop recording and persist or discard it according to the outcome.
    ///
    /// On failure a full-page screenshot is taken first (when a page is
    /// available), then the trace is written. Both are best-effort: errors are
    /// logged and never returned.
    pub async fn resolve(mut self, outcome: &TestOutcome, page: Option<&dyn Page>) -> CaptureResolution {
        self.resolved = true;
        let recorder = Arc::clone(&self.recorder);

        if outcome.is_success() {
            let _ = lock_recorder(&recorder).stop();
            tracing::debug!(test = %self.test_name, "test passed, trace discarded");
            return CaptureResolution {
                state: CaptureState::Discarded,
                screenshot: None,
            };
        }

        let screenshot = match page {
            Some(page) => match page.screenshot(true).await {
                Ok(png) => Some(png),
                Err(e) => {
                    tracing::warn!(test = %self.test_name, error = %e, "failed to capture failure screenshot");
                    None
                }
            },
            None => None,
        };

        let archive = lock_recorder(&recorder).stop();
        let timestamp = chrono::Local::now().format(TRACE_TIMESTAMP_FORMAT).to_string();

        let state = match persist_archive(&self.traces_dir, &self.test_name, &timestamp, &archive) {
            Ok(path) => {
                tracing::info!(test = %self.test_name, path = %path.display(), "trace saved");
                CaptureState::Persisted(path)
            }
            Err(e) => {
                tracing::warn!(test = %self.test_name, error = %e, "failed to save trace, discarding it");
                CaptureState::Discarded
            }
        };

        CaptureResolution { state, screenshot }
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        if !self.resolved {
            let _ = lock_recorder(&self.recorder).stop();
            tracing::warn!(test = %self.test_name, "capture dropped without resolution, trace discarded");
        }
    }
}

/// Write `archive` under `traces_dir` without replacing an earlier trace of
/// the same test: a name already taken gets a `_1`, `_2`, ... suffix.
fn persist_archive(
    traces_dir: &Path,
    test_name: &str,
    timestamp: &str,
    archive: &TraceArchive,
) -> HarnessResult<PathBuf> {
    fs::create_dir_all(traces_dir)?;
    for attempt in 0..MAX_TRACE_NAME_ATTEMPTS {
        let path = traces_dir.join(numbered_trace_file_name(test_name, timestamp, attempt));
        match archive.write_zip(&path) {
            Ok(()) => return Ok(path),
            Err(HarnessError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "trace name taken");
            }
            Err(e) => return Err(e),
        }
    }
    Err(HarnessError::Archive {
        message: format!("no free trace name for {test_name} at {timestamp}"),
    })
}

fn numbered_trace_file_name(test_name: &str, timestamp: &str, attempt: u32) -> String {
    let name = trace_file_name(test_name, timestamp);
    if attempt == 0 {
        return name;
    }
    let stem = name.trim_end_matches(".zip");
    format!("{stem}_{attempt}.zip")
}

/// `<test>_<timestamp>.zip` with path-hostile characters replaced
#[must_use]
pub fn trace_file_name(test_name: &str, timestamp: &str) -> String {
    let safe: String = test_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}_{timestamp}.zip")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod recorder_tests {
        use super::*;

        #[test]
        fn test_spans_nest_and_restore_parent() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            let outer = recorder.start_span("login");
            let inner = recorder.start_span("click");
            recorder.end_span(&inner);
            let sibling = recorder.start_span("fill");
            recorder.end_span(&sibling);
            recorder.end_span(&outer);

            let archive = recorder.stop();
            assert_eq!(archive.spans.len(), 3);
            assert_eq!(archive.spans_by_name("click")[0].parent_id.as_deref(), Some(outer.as_str()));
            assert_eq!(archive.spans_by_name("fill")[0].parent_id.as_deref(), Some(outer.as_str()));
            assert!(archive.spans_by_name("login")[0].parent_id.is_none());
            assert!(archive.spans.iter().all(|s| s.status == SpanStatus::Ok));
        }

        #[test]
        fn test_stop_cancels_open_spans() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            let _ = recorder.start_span("hung");
            let archive = recorder.stop();
            assert_eq!(archive.spans[0].status, SpanStatus::Cancelled);
            assert!(archive.spans[0].duration_ms().is_some());
            assert!(!recorder.is_running());
        }

        #[test]
        fn test_error_span() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            let id = recorder.start_span("goto");
            recorder.error_span(&id, "net::ERR_NAME_NOT_RESOLVED");
            recorder.end_span(&id);
            let archive = recorder.stop();
            let errors = archive.error_spans();
            assert_eq!(errors.len(), 1);
            assert_eq!(
                errors[0].attributes.get("error.message").map(String::as_str),
                Some("net::ERR_NAME_NOT_RESOLVED")
            );
        }

        #[test]
        fn test_frames_are_bounded() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default().with_max_frames(2));
            recorder.start();
            for i in 0..5 {
                recorder.frame(&format!("click {i}"), vec![i]);
            }
            assert_eq!(recorder.frame_count(), 2);
            assert!(!recorder.wants_frame());
        }

        #[test]
        fn test_default_frame_budget() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            for i in 0..(DEFAULT_MAX_FRAMES + 5) {
                recorder.frame(&format!("click {i}"), vec![0]);
            }
            assert_eq!(recorder.frame_count(), DEFAULT_MAX_FRAMES);
        }

        #[test]
        fn test_frames_disabled() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default().without_frames());
            recorder.start();
            recorder.frame("goto", vec![1]);
            assert_eq!(recorder.frame_count(), 0);
        }

        #[test]
        fn test_events_ignored_when_not_running() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.event("early", EventLevel::Info, "before start");
            assert_eq!(recorder.event_count(), 0);
            recorder.start();
            recorder.snapshot("https://shop.example/");
            assert_eq!(recorder.event_count(), 1);
        }

        #[test]
        fn test_source_reference() {
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            recorder.source("Arrange", Location::caller());
            let archive = recorder.stop();
            assert_eq!(archive.sources.len(), 1);
            assert!(archive.sources[0].file.ends_with(".rs"));
            assert!(archive.sources[0].line > 0);
        }
    }

    mod archive_tests {
        use super::*;

        #[test]
        fn test_write_zip_contains_trace_and_frames() {
            let dir = tempfile::tempdir().unwrap();
            let mut recorder = TraceRecorder::new("checkout", CaptureConfig::default());
            recorder.start();
            recorder.frame("goto", vec![0x89, 0x50, 0x4E, 0x47]);
            let archive = recorder.stop();

            let path = dir.path().join("nested/checkout.zip");
            archive.write_zip(&path).unwrap();

            let file = fs::File::open(&path).unwrap();
            let mut zip = zip::ZipArchive::new(file).unwrap();
            let names: Vec<String> = zip.file_names().map(str::to_string).collect();
            assert!(names.contains(&"trace.json".to_string()));
            assert!(names.contains(&"frames/0000.png".to_string()));

            let mut json = String::new();
            std::io::Read::read_to_string(&mut zip.by_name("trace.json").unwrap(), &mut json)
                .unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["metadata"]["test_name"], "checkout");
        }
    }

    mod file_name_tests {
        use super::*;

        #[test]
        fn test_trace_file_name() {
            assert_eq!(trace_file_name("t1", "20260101_120000"), "t1_20260101_120000.zip");
        }

        #[test]
        fn test_numbered_trace_file_name() {
            assert_eq!(numbered_trace_file_name("t1", "20260101_120000", 0), "t1_20260101_120000.zip");
            assert_eq!(numbered_trace_file_name("t1", "20260101_120000", 2), "t1_20260101_120000_2.zip");
        }

        #[test]
        fn test_same_second_failures_keep_both_traces() {
            let dir = tempfile::tempdir().unwrap();
            let mut paths = Vec::new();
            for label in ["first", "second"] {
                let mut recorder = TraceRecorder::new("t1", CaptureConfig::default());
                recorder.start();
                recorder.snapshot(label);
                let archive = recorder.stop();
                paths.push(persist_archive(dir.path(), "t1", "20260101_120000", &archive).unwrap());
            }
            assert_ne!(paths[0], paths[1]);
            assert!(paths[0].ends_with("t1_20260101_120000.zip"));
            assert!(paths[1].ends_with("t1_20260101_120000_1.zip"));
            assert!(paths.iter().all(|p| p.exists()));
        }

        #[test]
        fn test_write_zip_refuses_to_replace() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("t.zip");
            fs::write(&path, b"earlier").unwrap();
            let mut recorder = TraceRecorder::new("t", CaptureConfig::default());
            recorder.start();
            let err = recorder.stop().write_zip(&path).unwrap_err();
            assert!(matches!(err, HarnessError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));
            assert_eq!(fs::read(&path).unwrap(), b"earlier");
        }

        #[test]
        fn test_trace_file_name_sanitizes() {
            assert_eq!(
                trace_file_name("login / bad:user", "20260101_120000"),
                "login___bad_user_20260101_120000.zip"
            );
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn test_passed_discards() {
            let dir = tempfile::tempdir().unwrap();
            let capture = DiagnosticCapture::new(dir.path(), CaptureConfig::default());
            let active = capture.start("t_pass");
            assert_eq!(active.state(), CaptureState::Recording);

            let resolution = active.resolve(&TestOutcome::Passed, None).await;
            assert_eq!(resolution.state, CaptureState::Discarded);
            assert!(resolution.screenshot.is_none());
            assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_failed_persists() {
            let dir = tempfile::tempdir().unwrap();
            let traces = dir.path().join("traces");
            let capture = DiagnosticCapture::new(&traces, CaptureConfig::default());
            let active = capture.start("t1");

            let resolution = active.resolve(&TestOutcome::failed("boom"), None).await;
            let path = resolution.trace_path().unwrap().to_path_buf();
            assert!(path.exists());
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("t1_") && name.ends_with(".zip"));
            assert_eq!(name.len(), "t1_".len() + "yyyyMMdd_HHmmss".len() + ".zip".len());
        }

        #[tokio::test]
        async fn test_unwritable_directory_is_not_escalated() {
            let dir = tempfile::tempdir().unwrap();
            let blocker = dir.path().join("file");
            fs::write(&blocker, b"not a directory").unwrap();
            let capture = DiagnosticCapture::new(&blocker, CaptureConfig::default());

            let resolution = capture
                .start("t1")
                .resolve(&TestOutcome::failed("boom"), None)
                .await;
            assert_eq!(resolution.state, CaptureState::Discarded);
        }

        #[test]
        fn test_drop_without_resolution_stops_recorder() {
            let capture = DiagnosticCapture::new("unused", CaptureConfig::default());
            let active = capture.start("t");
            let recorder = active.recorder();
            drop(active);
            assert!(!lock_recorder(&recorder).is_running());
        }
    }
}
