//! Accessibility scan.
//!
//! Runs a set of WCAG 2.1 rule checks inside the page and reports the
//! violations. A scan is informational: violations are logged and attached to
//! the report, never turned into a test failure.

use crate::engine::Page;
use crate::result::HarnessResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score below which an audit is considered failing
pub const PASSING_SCORE: u8 = 80;

/// In-page rule checks. Returns one entry per violated rule with the number
/// of offending elements.
pub const AUDIT_SCRIPT: &str = r#"function accessibilityAudit() {
  const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
  const named = (el) => ((el.getAttribute('aria-label') || el.getAttribute('title') || el.innerText || '').trim().length > 0)
    || !!el.getAttribute('aria-labelledby');
  const labelled = (el) => named(el) || !!(el.id && document.querySelector(`label[for="${el.id}"]`)) || !!el.closest('label')
    || !!el.getAttribute('placeholder');
  const rules = [
    ['image-alt', '1.1.1', 'critical', 'Images must have alternate text',
      () => Array.from(document.querySelectorAll('img')).filter((el) => visible(el) && !el.hasAttribute('alt') && el.getAttribute('role') !== 'presentation')],
    ['label', '4.1.2', 'critical', 'Form elements must have labels',
      () => Array.from(document.querySelectorAll("input:not([type=hidden]):not([type=submit]):not([type=button]), select, textarea")).filter((el) => visible(el) && !labelled(el))],
    ['button-name', '4.1.2', 'critical', 'Buttons must have discernible text',
      () => Array.from(document.querySelectorAll('button, [role=button]')).filter((el) => visible(el) && !named(el))],
    ['link-name', '2.4.4', 'serious', 'Links must have discernible text',
      () => Array.from(document.querySelectorAll('a[href]')).filter((el) => visible(el) && !named(el) && !el.querySelector('img[alt]:not([alt=""])'))],
    ['html-has-lang', '3.1.1', 'serious', '<html> element must have a lang attribute',
      () => (document.documentElement.getAttribute('lang') || '').trim() ? [] : [document.documentElement]],
    ['document-title', '2.4.2', 'serious', 'Documents must have a <title> element',
      () => document.title.trim() ? [] : [document.documentElement]],
  ];
  return rules
    .map(([rule, wcag, impact, description, find]) => ({ rule, wcag, impact, description, nodes: find().length }))
    .filter((v) => v.nodes > 0);
}"#;

/// Impact of a violated rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Blocks some users entirely
    Critical,
    /// Seriously impairs some users
    Serious,
    /// Causes some difficulty
    Moderate,
    /// Annoyance
    Minor,
}

impl Impact {
    const fn deduction(self) -> u8 {
        match self {
            Self::Critical => 30,
            Self::Serious => 20,
            Self::Moderate => 10,
            Self::Minor => 0,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Critical => "CRITICAL",
            Self::Serious => "SERIOUS",
            Self::Moderate => "MODERATE",
            Self::Minor => "MINOR",
        })
    }
}

/// A violated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule id, e.g. `image-alt`
    pub rule: String,
    /// WCAG success criterion, e.g. `1.1.1`
    pub wcag: String,
    /// Impact
    pub impact: Impact,
    /// What the rule requires
    pub description: String,
    /// Number of offending elements
    pub nodes: usize,
}

impl Violation {
    /// Reference for the criterion
    #[must_use]
    pub fn help_url(&self) -> String {
        format!("https://www.w3.org/WAI/WCAG21/quickref/#{}", self.rule)
    }
}

/// Result of a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessibilityAudit {
    /// Violated rules
    pub violations: Vec<Violation>,
    /// Overall score (0-100)
    pub score: u8,
}

impl Default for AccessibilityAudit {
    fn default() -> Self {
        Self {
            violations: Vec::new(),
            score: 100,
        }
    }
}

impl AccessibilityAudit {
    /// Build an audit from violations, deducting points by impact
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        let mut audit = Self::default();
        for violation in violations {
            audit.add_violation(violation);
        }
        audit
    }

    /// Add a violation
    pub fn add_violation(&mut self, violation: Violation) {
        self.score = self.score.saturating_sub(violation.impact.deduction());
        self.violations.push(violation);
    }

    /// No violations and a passing score
    #[must_use]
    pub fn passes(&self) -> bool {
        self.violations.is_empty() && self.score >= PASSING_SCORE
    }

    /// Number of offending elements across all rules
    #[must_use]
    pub fn affected_nodes(&self) -> usize {
        self.violations.iter().map(|v| v.nodes).sum()
    }
}

/// Run the rule checks in `page`
pub async fn scan(page: &dyn Page) -> HarnessResult<AccessibilityAudit> {
    let value = page
        .call_function(AUDIT_SCRIPT, &serde_json::Value::Null)
        .await?;
    let violations: Vec<Violation> = serde_json::from_value(value)?;
    Ok(AccessibilityAudit::from_violations(violations))
}

/// Scan `page` and log the findings. Never fails: a scan that cannot run is
/// logged and yields `None`.
pub async fn check_accessibility(page: &dyn Page) -> Option<AccessibilityAudit> {
    tracing::info!("running accessibility scan");
    let audit = match scan(page).await {
        Ok(audit) => audit,
        Err(e) => {
            tracing::warn!(error = %e, "accessibility scan could not run");
            return None;
        }
    };

    if audit.violations.is_empty() {
        tracing::info!("no accessibility violations found");
    } else {
        tracing::error!(
            violations = audit.violations.len(),
            score = audit.score,
            "accessibility violations found"
        );
        for violation in &audit.violations {
            tracing::error!(
                impact = %violation.impact,
                rule = %violation.rule,
                wcag = %violation.wcag,
                nodes = violation.nodes,
                help = %violation.help_url(),
                "{}",
                violation.description
            );
        }
    }
    Some(audit)
}
