//! Storefront Harness: lifecycle core for storefront journey tests
//!
//! Owns the browser session for a suite run, isolates every test in its own
//! browser context, records a diagnostic trace that is kept only when a test
//! fails, and relays outcomes to a remote grid when the suite runs there.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Suite lifecycle                             │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  EnvironmentResolver ─► SessionManager ─► TestContextFactory     │
//! │        (local/grid)      (launch/connect,    (context + page,    │
//! │                           fallback)           DiagnosticCapture) │
//! │                                  │                   │           │
//! │                                  ▼                   ▼           │
//! │                        RemoteStatusReporter      Reporter        │
//! │                                                                  │
//! │  ResilientRegistrar (HTTP)        OutcomeRace (login outcome)    │
//! │  LoginPage / ProductPage / CartPage        accessibility scan    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Browsers are driven through the [`Engine`] trait. The `browser` feature
//! provides a Chromium engine over CDP; [`mock::MockEngine`] records calls
//! for tests.

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Accessibility scan
pub mod accessibility;
/// Diagnostic capture: trace recording and failure persistence
pub mod capture;
/// Product and cart page objects
pub mod cart;
/// Suite configuration and process environment
pub mod config;
/// Per-test browser contexts
pub mod context;
/// Browser automation seam
pub mod engine;
/// Local vs remote-grid resolution
pub mod environment;
/// Remote grid capabilities
pub mod grid;
/// Suite runner
pub mod harness;
/// Login page object
pub mod login;
/// Recording engine for tests
pub mod mock;
mod outcome;
/// Success/error signal race
pub mod race;
/// HTTP account registration
pub mod registrar;
/// Test result reporting
pub mod report;
mod result;
/// Suite session lifecycle
pub mod session;
/// Remote status relay
pub mod status;

/// Chromium engine over the DevTools protocol
#[cfg(feature = "browser")]
pub mod cdp;

pub use accessibility::{AccessibilityAudit, Impact, Violation};
pub use capture::{
    ActiveCapture, CaptureConfig, CaptureResolution, CaptureState, DiagnosticCapture,
    TraceArchive, TraceRecorder,
};
pub use cart::{CartLine, CartPage, Money, ProductPage};
pub use config::{GridConfig, ProcessEnv, SuiteConfig, Viewport};
pub use context::{SessionTeardown, TestContextFactory, TestSession, TracedPage};
pub use engine::{Browser, BrowserContext, BrowserKind, ContextOptions, Engine, LaunchOptions, Page};
pub use environment::{
    EnvironmentResolver, ExecutionTarget, GridCredentials, ResolvedEnvironment, SourceKind,
};
pub use grid::GridCapabilities;
pub use harness::{Harness, TestContext};
pub use login::LoginPage;
pub use outcome::TestOutcome;
pub use race::{OutcomeRace, SelectorSignal, Signal};
pub use registrar::{
    FormTransport, RegistrationIdentity, RegistrationReceipt, ReqwestTransport, ResilientRegistrar,
};
pub use report::{Reporter, TestResultEntry, TestStatus};
pub use result::{HarnessError, HarnessResult};
pub use session::{BrowserOrigin, SessionManager};
pub use status::{sanitize_reason, OutcomeReport, RemoteStatusReporter, ReportStatus};

#[cfg(feature = "browser")]
pub use cdp::CdpEngine;
