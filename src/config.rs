use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, SmokeError};
use crate::identity::DEFAULT_PASSWORD;

pub const DEFAULT_SCREENSHOT: &str = "verification_screenshot.png";
pub const CONFIG_FILE: &str = "auth-smoke.toml";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SmokeConfig {
    pub base_url: String,
    pub register_path: String,
    pub login_path: String,
    pub app_path: String,
    pub password: String,
    pub selectors: Selectors,
    pub screenshot: ScreenshotConfig,
    pub browser: BrowserOptions,
    pub navigation_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Selectors {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Filled with the password during registration when set.
    pub confirm_password: Option<String>,
    /// Shared by the register and login submit buttons.
    pub submit: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub path: PathBuf,
    pub full_page: bool,
    /// Append the run suffix to the file stem instead of overwriting one file.
    pub run_scoped: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BrowserOptions {
    pub headless: bool,
    pub sandbox: bool,
    pub chrome_executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            register_path: "/register.html".to_string(),
            login_path: "/login.html".to_string(),
            app_path: "/index.html".to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            selectors: Selectors::default(),
            screenshot: ScreenshotConfig::default(),
            browser: BrowserOptions::default(),
            navigation_timeout_ms: 30_000,
            poll_interval_ms: 100,
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            username: "#username".to_string(),
            email: "#email".to_string(),
            password: "#password".to_string(),
            confirm_password: None,
            submit: ".auth-btn".to_string(),
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SCREENSHOT),
            full_page: true,
            run_scoped: false,
        }
    }
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chrome_executable: None,
            window_width: 1280,
            window_height: 800,
        }
    }
}

/// Absolute URLs of the three pages the scenario moves through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrls {
    pub register: Url,
    pub login: Url,
    pub app: Url,
}

impl SmokeConfig {
    /// Loads from `explicit` if given, else the first config file found.
    /// A broken explicit file is an error; a broken discovered file is skipped.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = fs::read_to_string(path).map_err(|e| {
                SmokeError::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let config = Self::from_toml(&content)
                .map_err(|e| SmokeError::Config(format!("{}: {}", path.display(), e)))?;
            tracing::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => match Self::from_toml(&content) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn search_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(CONFIG_FILE),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("auth-smoke/config.toml"),
        ]
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SmokeError::Config(e.to_string()))
    }

    /// Applies `SMOKE_*` overrides read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup("SMOKE_BASE_URL") {
            self.base_url = base;
        }
        if let Some(path) = lookup("SMOKE_SCREENSHOT") {
            self.screenshot.path = PathBuf::from(path);
        }
        if let Some(chrome) = lookup("SMOKE_CHROME") {
            self.browser.chrome_executable = Some(PathBuf::from(chrome));
        }
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn target_urls(&self) -> Result<TargetUrls> {
        let base = Url::parse(&self.base_url)?;
        Ok(TargetUrls {
            register: base.join(&self.register_path)?,
            login: base.join(&self.login_path)?,
            app: base.join(&self.app_path)?,
        })
    }
}

impl ScreenshotConfig {
    /// Where this run's screenshot goes, given the run's identity suffix.
    pub fn path_for(&self, suffix: &str) -> PathBuf {
        let path = &self.path;
        if !self.run_scoped {
            return path.clone();
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "verification_screenshot".to_string());
        let ext = path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "png".to_string());
        path.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
    }
}
