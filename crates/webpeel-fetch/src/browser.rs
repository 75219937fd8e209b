//! Headless-browser rendering tier.
//!
//! The engine is abstracted behind [`HeadlessBrowser`] so the escalation
//! logic and tests do not depend on a running Chromium. The production
//! implementation drives one shared Chromium process via CDP, opening a
//! fresh page per request and closing it deterministically.

use crate::challenge::looks_like_challenge;
use crate::error::FetchError;
use crate::stealth::StealthProfile;
use crate::FetchStrategy;
use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webpeel_types::{BrowserAction, FetchMethod, FetchResult, PeelOptions};

/// One rendering request handed to the engine.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub url: String,
    /// Extra settle time after load.
    pub wait_ms: Option<u64>,
    pub actions: Vec<BrowserAction>,
    pub screenshot: bool,
    pub screenshot_full_page: bool,
    pub user_agent: Option<String>,
    /// Present on stealth renders.
    pub stealth: Option<StealthProfile>,
    pub timeout: Duration,
}

/// What a render produced.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub html: String,
    pub final_url: String,
    /// Base64-encoded PNG when a screenshot was requested.
    pub screenshot: Option<String>,
}

/// A rendering engine capable of executing a [`RenderRequest`].
#[async_trait]
pub trait HeadlessBrowser: Send + Sync {
    async fn render(&self, request: RenderRequest) -> Result<RenderOutput, FetchError>;
}

/// Shared Chromium instance; pages are per-request.
pub struct ChromiumBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromiumBrowser {
    /// Launch (and warm up) the shared browser process.
    pub async fn launch() -> Result<Self, FetchError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1920, 1080)
            .build()
            .map_err(|e| FetchError::Browser {
                url: String::new(),
                message: format!("browser config: {}", e),
            })?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            FetchError::Browser {
                url: String::new(),
                message: format!("browser launch: {}", e),
            }
        })?;

        // The CDP event loop must be polled for the lifetime of the
        // browser; it ends when the browser process does.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        info!("headless browser launched");
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Close the browser process and stop the event loop.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }

    async fn run_actions(page: &Page, actions: &[BrowserAction], human: bool) -> Result<(), FetchError> {
        for action in actions {
            if human {
                tokio::time::sleep(StealthProfile::human_delay()).await;
            }
            Self::run_action(page, action).await?;
        }
        Ok(())
    }

    async fn run_action(page: &Page, action: &BrowserAction) -> Result<(), FetchError> {
        let browser_err = |e: chromiumoxide::error::CdpError| FetchError::Browser {
            url: String::new(),
            message: e.to_string(),
        };
        match action {
            BrowserAction::Click { selector } => {
                page.find_element(selector.as_str())
                    .await
                    .map_err(browser_err)?
                    .click()
                    .await
                    .map_err(browser_err)?;
            }
            BrowserAction::Fill { selector, value } => {
                let element = page
                    .find_element(selector.as_str())
                    .await
                    .map_err(browser_err)?;
                element.click().await.map_err(browser_err)?;
                element.type_str(value.as_str()).await.map_err(browser_err)?;
            }
            BrowserAction::Press { key } => {
                page.find_element("body")
                    .await
                    .map_err(browser_err)?
                    .press_key(key.as_str())
                    .await
                    .map_err(browser_err)?;
            }
            BrowserAction::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            BrowserAction::Scroll { pixels } => {
                let script = match pixels {
                    Some(px) => format!("window.scrollBy(0, {})", px),
                    None => "window.scrollTo(0, document.body.scrollHeight)".to_string(),
                };
                page.evaluate(script).await.map_err(browser_err)?;
            }
            BrowserAction::WaitForSelector {
                selector,
                timeout_ms,
            } => {
                let deadline = tokio::time::Instant::now()
                    + Duration::from_millis(timeout_ms.unwrap_or(10_000));
                loop {
                    if page.find_element(selector.as_str()).await.is_ok() {
                        break;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(FetchError::Browser {
                            url: String::new(),
                            message: format!("selector `{}` never appeared", selector),
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
        Ok(())
    }

    async fn render_inner(&self, request: &RenderRequest) -> Result<RenderOutput, FetchError> {
        let browser_err = |e: chromiumoxide::error::CdpError| FetchError::Browser {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(browser_err)?;

        let result = self.drive_page(&page, request).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "page close failed");
        }
        result
    }

    async fn drive_page(
        &self,
        page: &Page,
        request: &RenderRequest,
    ) -> Result<RenderOutput, FetchError> {
        let browser_err = |e: chromiumoxide::error::CdpError| FetchError::Browser {
            url: request.url.clone(),
            message: e.to_string(),
        };

        if let Some(profile) = &request.stealth {
            page.set_user_agent(profile.user_agent.clone())
                .await
                .map_err(browser_err)?;
            let script = AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(profile.evasion_script())
                .build()
                .map_err(|e| FetchError::Browser {
                    url: request.url.clone(),
                    message: e,
                })?;
            page.evaluate_on_new_document(script)
                .await
                .map_err(browser_err)?;
        } else if let Some(ua) = &request.user_agent {
            page.set_user_agent(ua.clone()).await.map_err(browser_err)?;
        }

        page.goto(request.url.clone()).await.map_err(browser_err)?;
        page.wait_for_navigation().await.map_err(browser_err)?;

        if let Some(ms) = request.wait_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        Self::run_actions(page, &request.actions, request.stealth.is_some()).await?;

        let screenshot = if request.screenshot {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(request.screenshot_full_page)
                .build();
            let bytes = page.screenshot(params).await.map_err(browser_err)?;
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        } else {
            None
        };

        let html = page.content().await.map_err(browser_err)?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| request.url.clone());

        Ok(RenderOutput {
            html,
            final_url,
            screenshot,
        })
    }
}

#[async_trait]
impl HeadlessBrowser for ChromiumBrowser {
    async fn render(&self, request: RenderRequest) -> Result<RenderOutput, FetchError> {
        match tokio::time::timeout(request.timeout, self.render_inner(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { url: request.url }),
        }
    }
}

/// Fetch strategy backed by a rendering engine, in plain or stealth mode.
pub struct BrowserFetcher {
    engine: Arc<dyn HeadlessBrowser>,
    stealth: bool,
}

impl BrowserFetcher {
    pub fn new(engine: Arc<dyn HeadlessBrowser>) -> Self {
        Self {
            engine,
            stealth: false,
        }
    }

    pub fn stealth(engine: Arc<dyn HeadlessBrowser>) -> Self {
        Self {
            engine,
            stealth: true,
        }
    }

    fn request_for(&self, url: &str, options: &PeelOptions) -> RenderRequest {
        RenderRequest {
            url: url.to_string(),
            wait_ms: options.wait,
            actions: options.actions.clone(),
            screenshot: options.screenshot,
            screenshot_full_page: options.screenshot_full_page,
            user_agent: options.user_agent.clone(),
            stealth: self.stealth.then(StealthProfile::random),
            timeout: Duration::from_millis(options.timeout_ms),
        }
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetcher {
    fn name(&self) -> &'static str {
        if self.stealth {
            "stealth"
        } else {
            "browser"
        }
    }

    fn method(&self) -> FetchMethod {
        if self.stealth {
            FetchMethod::Stealth
        } else {
            FetchMethod::Browser
        }
    }

    async fn fetch(&self, url: &str, options: &PeelOptions) -> Result<FetchResult, FetchError> {
        let output = self.engine.render(self.request_for(url, options)).await?;
        let challenge = looks_like_challenge(&output.html, 200);
        Ok(FetchResult {
            url: output.final_url,
            html: output.html,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            method: self.method(),
            challenge_detected: challenge,
            edge: None,
            screenshot: output.screenshot,
        })
    }
}
