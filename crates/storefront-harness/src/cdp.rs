//! Chrome DevTools Protocol engine backed by `chromiumoxide`.
//!
//! Each test context maps to a CDP browser context, so cookies and storage
//! never leak between tests. Pages are sized through a device-metrics
//! override rather than the window size, which only applies at launch.

use crate::engine::{Browser, BrowserContext, BrowserKind, ContextOptions, Engine, LaunchOptions, Page};
use crate::result::{HarnessError, HarnessResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::handler::Handler;
use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Engine that launches local Chromium or connects to a CDP endpoint
#[derive(Debug, Clone, Default)]
pub struct CdpEngine {
    no_sandbox: bool,
}

impl CdpEngine {
    /// Create a new engine
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch Chromium without its sandbox (containers, CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.no_sandbox = true;
        self
    }
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!(error = %e, "CDP handler stopped");
                break;
            }
        }
    })
}

#[async_trait]
impl Engine for CdpEngine {
    fn name(&self) -> &'static str {
        "chromiumoxide"
    }

    async fn launch(
        &self,
        kind: BrowserKind,
        options: LaunchOptions,
    ) -> HarnessResult<Box<dyn Browser>> {
        if kind != BrowserKind::Chromium {
            return Err(HarnessError::UnsupportedBrowser {
                browser: kind.to_string(),
                engine: self.name().to_string(),
            });
        }

        let mut builder = CdpConfig::builder();
        if !options.headless {
            builder = builder.with_head();
        }
        if self.no_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder
            .build()
            .map_err(|message| HarnessError::BrowserLaunchError { message })?;

        let (browser, handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| HarnessError::BrowserLaunchError {
                message: e.to_string(),
            })?;

        Ok(Box::new(CdpSession {
            inner: Arc::new(Mutex::new(browser)),
            handler: spawn_handler(handler),
        }))
    }

    async fn connect(&self, endpoint: &str) -> HarnessResult<Box<dyn Browser>> {
        let (browser, handler) = CdpBrowser::connect(endpoint)
            .await
            .map_err(|e| HarnessError::ConnectionFailed {
                message: e.to_string(),
            })?;

        Ok(Box::new(CdpSession {
            inner: Arc::new(Mutex::new(browser)),
            handler: spawn_handler(handler),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        Ok(())
    }
}

/// A launched or connected CDP browser
#[derive(Debug)]
pub struct CdpSession {
    inner: Arc<Mutex<CdpBrowser>>,
    handler: JoinHandle<()>,
}

#[async_trait]
impl Browser for CdpSession {
    async fn new_context(&self, options: ContextOptions) -> HarnessResult<Box<dyn BrowserContext>> {
        let id = self
            .inner
            .lock()
            .await
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| HarnessError::page(e.to_string()))?;

        Ok(Box::new(CdpContext {
            browser: Arc::clone(&self.inner),
            id,
            options,
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> HarnessResult<()> {
        let result = self.inner.lock().await.close().await;
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|e| HarnessError::page(e.to_string()))
    }
}

/// A CDP browser context
#[derive(Debug)]
pub struct CdpContext {
    browser: Arc<Mutex<CdpBrowser>>,
    id: BrowserContextId,
    options: ContextOptions,
    closed: AtomicBool,
}

#[async_trait]
impl BrowserContext for CdpContext {
    async fn new_page(&self) -> HarnessResult<Box<dyn Page>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(HarnessError::page)?;

        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(|e| HarnessError::page(e.to_string()))?;

        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(self.options.viewport_width),
            i64::from(self.options.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(|e| HarnessError::page(e.to_string()))?;

        Ok(Box::new(CdpTab { inner: page }))
    }

    async fn close(&self) -> HarnessResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.browser
            .lock()
            .await
            .dispose_browser_context(self.id.clone())
            .await
            .map_err(|e| HarnessError::page(e.to_string()))
    }
}

/// A page inside a CDP browser context
#[derive(Debug)]
pub struct CdpTab {
    inner: CdpPage,
}

const PROBE_SCRIPT: &str = r"
(selector, text) => {
    for (const el of document.querySelectorAll(selector)) {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        const visible = style.visibility !== 'hidden' && style.display !== 'none'
            && rect.width > 0 && rect.height > 0;
        const content = (el.textContent || '').trim();
        if (visible && (text === null || content.includes(text))) {
            return content;
        }
    }
    return null;
}";

impl CdpTab {
    async fn evaluate_value(&self, expression: String) -> HarnessResult<serde_json::Value> {
        let result = self
            .inner
            .evaluate(expression)
            .await
            .map_err(|e| HarnessError::EvaluationError {
                message: e.to_string(),
            })?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl Page for CdpTab {
    async fn goto(&self, url: &str) -> HarnessResult<()> {
        self.inner
            .goto(url)
            .await
            .map_err(|e| HarnessError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> HarnessResult<()> {
        let element = self
            .inner
            .find_element(selector)
            .await
            .map_err(|e| HarnessError::page(format!("{selector}: {e}")))?;
        element
            .call_js_fn("function() { this.value = ''; this.focus(); }", false)
            .await
            .map_err(|e| HarnessError::page(format!("{selector}: {e}")))?;
        element
            .type_str(text)
            .await
            .map_err(|e| HarnessError::page(format!("{selector}: {e}")))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> HarnessResult<()> {
        self.inner
            .find_element(selector)
            .await
            .map_err(|e| HarnessError::page(format!("{selector}: {e}")))?
            .click()
            .await
            .map_err(|e| HarnessError::page(format!("{selector}: {e}")))?;
        Ok(())
    }

    async fn probe(&self, selector: &str, text: Option<&str>) -> HarnessResult<Option<String>> {
        let expression = format!(
            "({PROBE_SCRIPT})({}, {})",
            serde_json::to_string(selector)?,
            serde_json::to_string(&text)?
        );
        match self.evaluate_value(expression).await? {
            serde_json::Value::String(found) => Ok(Some(found)),
            _ => Ok(None),
        }
    }

    async fn call_function(
        &self,
        function: &str,
        argument: &serde_json::Value,
    ) -> HarnessResult<serde_json::Value> {
        let expression = format!("({function})({})", serde_json::to_string(argument)?);
        self.evaluate_value(expression).await
    }

    async fn screenshot(&self, full_page: bool) -> HarnessResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        self.inner
            .screenshot(params)
            .await
            .map_err(|e| HarnessError::ScreenshotError {
                message: e.to_string(),
            })
    }

    async fn url(&self) -> HarnessResult<String> {
        let url = self
            .inner
            .url()
            .await
            .map_err(|e| HarnessError::page(e.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }
}
