use std::future::Future;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::{self, JoinHandle};

use crate::config::BrowserOptions;
use crate::error::{Result, SmokeError};

pub fn browser_config(options: &BrowserOptions, request_timeout: Duration) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .request_timeout(request_timeout)
        .window_size(options.window_width, options.window_height);

    if !options.headless {
        builder = builder.with_head();
    }
    if !options.sandbox {
        builder = builder.no_sandbox();
    }
    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    builder
        .build()
        .map_err(|e| SmokeError::Launch(format!("Failed to build browser config: {}", e)))
}

/// One browser process, one page, and the task pumping CDP events between them.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(options: &BrowserOptions, request_timeout: Duration) -> Result<Self> {
        let config = browser_config(options, request_timeout)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SmokeError::Launch(format!("Failed to launch chromium: {}", e)))?;

        // The connection stalls unless CDP events are drained.
        let handler = task::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut browser = browser;
                let _ = browser.close().await;
                handler.abort();
                return Err(SmokeError::Launch(format!("Failed to create initial page: {}", e)));
            }
        };

        tracing::info!(headless = options.headless, "Browser launched");
        Ok(Self { browser, page, handler })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn close(mut self) -> Result<()> {
        let closed = self
            .browser
            .close()
            .await
            .map_err(|e| SmokeError::Launch(format!("Failed to close browser: {}", e)));
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        let _ = self.handler.await;
        tracing::info!("Browser closed");
        closed.map(|_| ())
    }

    /// Launches a browser, hands its page to `run`, and closes the browser
    /// whatever `run` returns. An error from `run` takes precedence over a
    /// close failure.
    pub async fn scoped<F, Fut, T>(options: &BrowserOptions, request_timeout: Duration, run: F) -> Result<T>
    where
        F: FnOnce(Page) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Self::launch(options, request_timeout).await?;
        let outcome = run(session.page.clone()).await;
        let closed = session.close().await;
        settle(outcome, closed)
    }
}

fn settle<T>(outcome: Result<T>, closed: Result<()>) -> Result<T> {
    match (outcome, closed) {
        (Err(e), Err(close_err)) => {
            tracing::warn!("{}", close_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Ok(value), Ok(())) => Ok(value),
    }
}
