//! Run report.
//!
//! Collects one [`TestResultEntry`] per test with its steps, parameters and
//! failure attachments, and writes them as `report.json`, `junit.xml` and an
//! `attachments/` directory.

use crate::outcome::TestOutcome;
use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// JSON report file name
pub const REPORT_JSON: &str = "report.json";

/// JUnit report file name
pub const REPORT_JUNIT: &str = "junit.xml";

/// Attachment directory name
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// Test passed
    Passed,
    /// Test failed
    Failed,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Named step opened by a test body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEntry {
    /// Step name
    pub name: String,
    /// Offset from test start in milliseconds
    pub offset_ms: u64,
    /// Source location that opened the step
    pub location: String,
}

/// Attachment payload
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    /// In-memory bytes
    Bytes(Vec<u8>),
    /// Existing file, copied on write
    File(PathBuf),
}

/// File attached to a test result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// File name under `attachments/`, set when the report is written
    pub file: Option<String>,
    /// Payload
    #[serde(skip)]
    pub content: Option<AttachmentContent>,
}

impl Attachment {
    /// PNG screenshot attachment
    #[must_use]
    pub fn png(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: "image/png".to_string(),
            file: None,
            content: Some(AttachmentContent::Bytes(bytes)),
        }
    }

    /// Trace archive attachment
    #[must_use]
    pub fn trace(path: impl Into<PathBuf>) -> Self {
        Self {
            name: "Trace".to_string(),
            content_type: "application/zip".to_string(),
            file: None,
            content: Some(AttachmentContent::File(path.into())),
        }
    }

    fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "application/zip" => "zip",
            _ => "bin",
        }
    }
}

/// Individual test result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultEntry {
    /// Test name
    pub name: String,
    /// Test status
    pub status: TestStatus,
    /// Duration of test execution
    pub duration: Duration,
    /// Error message if failed
    pub error: Option<String>,
    /// Named steps
    pub steps: Vec<StepEntry>,
    /// Parameters recorded by the test body
    pub parameters: Vec<(String, String)>,
    /// Failure artifacts
    pub attachments: Vec<Attachment>,
    /// Timestamp when test completed
    pub timestamp: SystemTime,
}

impl TestResultEntry {
    /// Create a passing test result
    #[must_use]
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            duration,
            error: None,
            steps: Vec::new(),
            parameters: Vec::new(),
            attachments: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Create a failing test result
    #[must_use]
    pub fn failed(name: impl Into<String>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            status: TestStatus::Failed,
            ..Self::passed(name, duration)
        }
    }

    /// Create from an outcome
    #[must_use]
    pub fn from_outcome(name: impl Into<String>, duration: Duration, outcome: &TestOutcome) -> Self {
        match outcome {
            TestOutcome::Passed => Self::passed(name, duration),
            TestOutcome::Failed { message } => Self::failed(name, duration, message.clone()),
        }
    }

    /// Add steps
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<StepEntry>) -> Self {
        self.steps = steps;
        self
    }

    /// Add parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: Vec<(String, String)>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Add an attachment
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Look up a parameter
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    suite: &'a str,
    total: usize,
    passed: usize,
    failed: usize,
    duration: Duration,
    tests: &'a [TestResultEntry],
}

/// Collects test results for a run
#[derive(Debug, Default)]
pub struct Reporter {
    results: Vec<TestResultEntry>,
    suite_name: String,
}

impl Reporter {
    /// Create new reporter
    #[must_use]
    pub fn new() -> Self {
        Self {
            suite_name: "Storefront Journeys".to_string(),
            ..Default::default()
        }
    }

    /// Set suite name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.suite_name = name.into();
        self
    }

    /// Record a test result
    pub fn record(&mut self, result: TestResultEntry) {
        self.results.push(result);
    }

    /// Get number of passed tests
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_passed()).count()
    }

    /// Get number of failed tests
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    /// Get total test count
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// Check if all tests passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get total duration
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }

    /// Get test results
    #[must_use]
    pub fn results(&self) -> &[TestResultEntry] {
        &self.results
    }

    /// Get failing tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResultEntry> {
        self.results
            .iter()
            .filter(|r| r.status.is_failed())
            .collect()
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed, {} failed in {:.1}s",
            self.suite_name,
            self.passed_count(),
            self.total_count(),
            self.failed_count(),
            self.total_duration().as_secs_f64()
        )
    }

    /// Write `report.json`, `junit.xml` and attachment files under `dir`
    pub fn write(&mut self, dir: &Path) -> HarnessResult<PathBuf> {
        let attachments_dir = dir.join(ATTACHMENTS_DIR);
        std::fs::create_dir_all(&attachments_dir)?;

        for (t, result) in self.results.iter_mut().enumerate() {
            let test_slug = slug(&result.name);
            for (a, attachment) in result.attachments.iter_mut().enumerate() {
                let file = format!("{t:03}_{test_slug}_{a}.{}", attachment.extension());
                let target = attachments_dir.join(&file);
                let written = match &attachment.content {
                    Some(AttachmentContent::Bytes(bytes)) => std::fs::write(&target, bytes),
                    Some(AttachmentContent::File(source)) => std::fs::copy(source, &target).map(|_| ()),
                    None => continue,
                };
                match written {
                    Ok(()) => attachment.file = Some(file),
                    Err(e) => tracing::warn!(attachment = %attachment.name, error = %e, "failed to write attachment"),
                }
            }
        }

        let document = ReportDocument {
            suite: &self.suite_name,
            total: self.total_count(),
            passed: self.passed_count(),
            failed: self.failed_count(),
            duration: self.total_duration(),
            tests: &self.results,
        };
        let json_path = dir.join(REPORT_JSON);
        std::fs::write(&json_path, serde_json::to_string_pretty(&document)?)?;
        std::fs::write(dir.join(REPORT_JUNIT), self.render_junit())?;
        tracing::info!(path = %json_path.display(), "report written");
        Ok(json_path)
    }

    /// Render JUnit XML content
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::new();

        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}">"#,
            escape_xml(&self.suite_name),
            self.total_count(),
            self.failed_count(),
            self.total_duration().as_secs_f64()
        ));
        xml.push('\n');

        for result in &self.results {
            xml.push_str(&format!(
                r#"  <testcase name="{}" time="{:.3}">"#,
                escape_xml(&result.name),
                result.duration.as_secs_f64()
            ));
            xml.push('\n');

            if let Some(error) = &result.error {
                let first_line = error.lines().next().unwrap_or_default();
                xml.push_str(&format!(
                    r#"    <failure message="{}">{}</failure>"#,
                    escape_xml(first_line),
                    escape_xml(error)
                ));
                xml.push('\n');
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
