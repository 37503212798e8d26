use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;

use crate::error::{Result, SmokeError};

/// The page operations a scenario needs. Implemented for a live CDP page;
/// tests substitute an in-memory application.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates and waits for the load to settle.
    async fn goto(&self, url: &str) -> Result<()>;
    /// Replaces the value of the element matched by `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;
    async fn click(&self, selector: &str) -> Result<()>;
    async fn current_url(&self) -> Result<Option<String>>;
    /// PNG bytes of the current page.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;
    /// Whether the current document has finished loading.
    async fn document_ready(&self) -> Result<bool> {
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(100),
        }
    }
}

fn same_url(current: &str, expected: &Url) -> bool {
    match Url::parse(current) {
        Ok(parsed) => &parsed == expected,
        Err(_) => current == expected.as_str(),
    }
}

/// Polls the page location until it equals `expected` and the document has
/// loaded, returning the matched URL.
pub async fn wait_for_url(driver: &dyn PageDriver, expected: &Url, wait: WaitConfig) -> Result<String> {
    let deadline = Instant::now() + wait.timeout;
    let mut last_seen = None;

    loop {
        match driver.current_url().await {
            Ok(Some(current)) => {
                if same_url(&current, expected) {
                    match driver.document_ready().await {
                        Ok(true) => return Ok(current),
                        Ok(false) => {}
                        Err(e) => tracing::debug!("readyState check failed on {}: {}", current, e),
                    }
                }
                last_seen = Some(current);
            }
            Ok(None) => {}
            // The target can be briefly unavailable mid-navigation.
            Err(e) => tracing::debug!("URL read failed while waiting for {}: {}", expected, e),
        }

        if Instant::now() >= deadline {
            return Err(SmokeError::NavigationTimeout {
                expected: expected.to_string(),
                actual: last_seen,
                timeout: wait.timeout,
            });
        }
        sleep(wait.poll_interval).await;
    }
}

/// Re-runs `action` while its element is missing, until `wait.timeout` runs out.
async fn retry_while_missing<F, Fut>(selector: &str, wait: WaitConfig, mut action: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let deadline = Instant::now() + wait.timeout;
    loop {
        match action().await {
            Err(SmokeError::ElementNotFound { message, .. }) if Instant::now() < deadline => {
                tracing::debug!("{} not present yet ({}), retrying", selector, message);
                sleep(wait.poll_interval).await;
            }
            outcome => return outcome,
        }
    }
}

/// `fill` that waits for the element to appear first.
pub async fn fill_when_present(driver: &dyn PageDriver, selector: &str, value: &str, wait: WaitConfig) -> Result<()> {
    retry_while_missing(selector, wait, || driver.fill(selector, value)).await
}

/// `click` that waits for the element to appear first.
pub async fn click_when_present(driver: &dyn PageDriver, selector: &str, wait: WaitConfig) -> Result<()> {
    retry_while_missing(selector, wait, || driver.click(selector)).await
}

#[async_trait]
impl PageDriver for Page {
    async fn goto(&self, url: &str) -> Result<()> {
        Page::goto(self, url).await.map_err(|e| SmokeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Page::wait_for_navigation(self)
            .await
            .map_err(|e| SmokeError::Navigation {
                url: url.to_string(),
                message: format!("Wait for navigation failed: {}", e),
            })?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let element = self
            .find_element(selector)
            .await
            .map_err(|e| SmokeError::ElementNotFound {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;

        let interaction = |e: chromiumoxide::error::CdpError| SmokeError::Interaction {
            selector: selector.to_string(),
            message: e.to_string(),
        };

        element.focus().await.map_err(interaction)?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(interaction)?;
        element.type_str(value).await.map_err(interaction)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .find_element(selector)
            .await
            .map_err(|e| SmokeError::ElementNotFound {
                selector: selector.to_string(),
                message: e.to_string(),
            })?;

        element.click().await.map_err(|e| SmokeError::Interaction {
            selector: selector.to_string(),
            message: format!("CDP click failed: {}", e),
        })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Page::url(self).await.map_err(|e| SmokeError::Navigation {
            url: "<current>".to_string(),
            message: e.to_string(),
        })
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();
        Page::screenshot(self, params)
            .await
            .map_err(|e| SmokeError::Screenshot(e.to_string()))
    }

    async fn document_ready(&self) -> Result<bool> {
        let check_failed = |e: String| SmokeError::Navigation {
            url: "<current>".to_string(),
            message: format!("readyState check failed: {}", e),
        };
        let result = self
            .evaluate("document.readyState")
            .await
            .map_err(|e| check_failed(e.to_string()))?;
        let state: String = result
            .into_value()
            .map_err(|e| check_failed(e.to_string()))?;
        Ok(state == "complete")
    }
}
