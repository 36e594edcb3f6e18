//! Terminal output

use console::{style, Style, Term};
use std::time::Duration;

/// Writes human-facing results to stdout; logs go to stderr separately
#[derive(Debug)]
pub struct Printer {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Printer {
    /// Create a printer
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Print a passed journey
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failed journey; shown even in quiet mode
    pub fn failure(&self, message: &str, reason: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
        let _ = self.term.write_line(&format!("    {reason}"));
    }

    /// Print a warning to stderr; shown even in quiet mode
    pub fn warning(&self, message: &str) {
        let prefix = if self.use_color {
            style("warning:").yellow().bold().to_string()
        } else {
            "warning:".to_string()
        };
        let _ = Term::stderr().write_line(&format!("{prefix} {message}"));
    }

    /// Print a key/value line
    pub fn field(&self, key: &str, value: &str) {
        let key = if self.use_color {
            style(format!("{key:>12}")).cyan().to_string()
        } else {
            format!("{key:>12}")
        };
        let _ = self.term.write_line(&format!("{key}  {value}"));
    }

    /// Print a plain line
    pub fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }
        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };
        let _ = self.term.write_line(&styled);
    }

    /// Print the suite summary
    pub fn summary(&self, passed: usize, failed: usize, duration: Duration) {
        if self.quiet && failed == 0 {
            return;
        }
        let total = passed + failed;
        let secs = duration.as_secs_f64();
        let _ = self.term.write_line("");
        if self.use_color {
            let status = if failed > 0 {
                Style::new().red().bold().apply_to("FAILED")
            } else {
                Style::new().green().bold().apply_to("PASSED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} journeys in {secs:.2}s ({passed} passed, {failed} failed)"
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} journeys in {secs:.2}s ({passed} passed, {failed} failed)"
            ));
        }
    }
}
