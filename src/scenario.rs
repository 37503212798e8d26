use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ScreenshotConfig, Selectors, SmokeConfig, TargetUrls};
use crate::driver::{click_when_present, fill_when_present, wait_for_url, PageDriver, WaitConfig};
use crate::error::{Result, SmokeError};
use crate::identity::TestUser;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    OnRegisterPage,
    OnLoginPage,
    OnAppPage,
    ScreenshotTaken,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub username: String,
    pub email: String,
    pub screenshot: PathBuf,
    pub screenshot_bytes: usize,
    pub stages: Vec<StageTiming>,
}

struct StageLog {
    started: Instant,
    stages: Vec<StageTiming>,
}

impl StageLog {
    fn new() -> Self {
        let mut log = Self {
            started: Instant::now(),
            stages: Vec::new(),
        };
        log.enter(Stage::Start);
        log
    }

    fn enter(&mut self, stage: Stage) {
        let elapsed_ms = self.started.elapsed().as_millis();
        tracing::info!(?stage, elapsed_ms = elapsed_ms as u64, "Stage reached");
        self.stages.push(StageTiming { stage, elapsed_ms });
    }
}

/// Register, log in, land on the app page, and keep a screenshot as evidence.
pub struct AuthScenario {
    urls: TargetUrls,
    selectors: Selectors,
    password: String,
    screenshot: ScreenshotConfig,
    wait: WaitConfig,
}

impl AuthScenario {
    pub fn from_config(config: &SmokeConfig) -> Result<Self> {
        Ok(Self {
            urls: config.target_urls()?,
            selectors: config.selectors.clone(),
            password: config.password.clone(),
            screenshot: config.screenshot.clone(),
            wait: WaitConfig {
                timeout: config.navigation_timeout(),
                poll_interval: config.poll_interval(),
            },
        })
    }

    pub fn urls(&self) -> &TargetUrls {
        &self.urls
    }

    /// Runs the full flow under a freshly generated identity.
    pub async fn run(&self, driver: &dyn PageDriver) -> Result<RunReport> {
        let user = TestUser::generate(&self.password);
        self.run_as(driver, &user).await
    }

    pub async fn run_as(&self, driver: &dyn PageDriver, user: &TestUser) -> Result<RunReport> {
        user.validate()?;
        tracing::info!(username = %user.username, email = %user.email, "Starting auth scenario");

        let mut log = StageLog::new();

        driver.goto(self.urls.register.as_str()).await?;
        log.enter(Stage::OnRegisterPage);
        self.register(driver, user).await?;
        wait_for_url(driver, &self.urls.login, self.wait).await?;
        log.enter(Stage::OnLoginPage);

        self.login(driver, user).await?;
        wait_for_url(driver, &self.urls.app, self.wait).await?;
        log.enter(Stage::OnAppPage);

        let path = self.screenshot.path_for(user.suffix());
        let screenshot_bytes = self.capture(driver, &path).await?;
        log.enter(Stage::ScreenshotTaken);
        log.enter(Stage::Done);

        Ok(RunReport {
            username: user.username.clone(),
            email: user.email.clone(),
            screenshot: path,
            screenshot_bytes,
            stages: log.stages,
        })
    }

    /// Fills in the registration form and submits. Does not wait for the redirect.
    async fn register(&self, driver: &dyn PageDriver, user: &TestUser) -> Result<()> {
        self.fill(driver, &self.selectors.username, &user.username).await?;
        self.fill(driver, &self.selectors.email, &user.email).await?;
        self.fill(driver, &self.selectors.password, &user.password).await?;
        if let Some(confirm) = &self.selectors.confirm_password {
            self.fill(driver, confirm, &user.password).await?;
        }
        click_when_present(driver, &self.selectors.submit, self.wait).await
    }

    async fn login(&self, driver: &dyn PageDriver, user: &TestUser) -> Result<()> {
        self.fill(driver, &self.selectors.email, &user.email).await?;
        self.fill(driver, &self.selectors.password, &user.password).await?;
        click_when_present(driver, &self.selectors.submit, self.wait).await
    }

    async fn fill(&self, driver: &dyn PageDriver, selector: &str, value: &str) -> Result<()> {
        fill_when_present(driver, selector, value, self.wait).await
    }

    async fn capture(&self, driver: &dyn PageDriver, path: &Path) -> Result<usize> {
        let png = driver.screenshot(self.screenshot.full_page).await?;
        if !png.starts_with(PNG_SIGNATURE) {
            return Err(SmokeError::Screenshot(format!(
                "capture returned {} bytes without a PNG signature",
                png.len()
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &png).await?;
        tracing::info!("Saved screenshot to {} ({} bytes)", path.display(), png.len());
        Ok(png.len())
    }

    /// Visits the app page without a session and expects to be sent to login.
    pub async fn verify_guard(&self, driver: &dyn PageDriver) -> Result<String> {
        driver.goto(self.urls.app.as_str()).await?;
        let landed = wait_for_url(driver, &self.urls.login, self.wait).await?;
        tracing::info!("Unauthenticated visit to {} redirected to {}", self.urls.app, landed);
        Ok(landed)
    }
}
