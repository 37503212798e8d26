use auth_smoke::logging::{init_logging, LoggingConfig};
use auth_smoke::{AuthScenario, BrowserSession, SmokeConfig, SmokeError};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;

/// Drives a headless browser through register -> login -> landing page.
#[derive(Parser)]
#[command(name = "auth-smoke")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./auth-smoke.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the application under test
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Where to write the screenshot
    #[arg(long, global = true)]
    screenshot: Option<PathBuf>,

    /// Append the run's identity suffix to the screenshot file name
    #[arg(long, global = true)]
    run_scoped_screenshot: bool,

    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,

    /// Chrome/Chromium executable
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Disable the Chromium sandbox (containers running as root)
    #[arg(long, global = true)]
    no_sandbox: bool,

    /// Navigation wait timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Print the run report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Log filter, e.g. `debug` or `auth_smoke=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write a daily-rolling log file into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Register a fresh user, log in, and screenshot the landing page
    Run,
    /// Check that the landing page redirects to login without a session
    Guard,
}

impl Cli {
    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
            log_file: None,
        }
    }

    /// File (or defaults), then environment, then flags.
    fn resolve_config<F>(&self, file: SmokeConfig, lookup: F) -> SmokeConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = file;
        config.apply_env_from(lookup);
        self.apply(&mut config);
        config
    }

    fn apply(&self, config: &mut SmokeConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(path) = &self.screenshot {
            config.screenshot.path = path.clone();
        }
        if self.run_scoped_screenshot {
            config.screenshot.run_scoped = true;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(chrome) = &self.chrome {
            config.browser.chrome_executable = Some(chrome.clone());
        }
        if self.no_sandbox {
            config.browser.sandbox = false;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.navigation_timeout_ms = timeout_ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenv();
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.logging_config())?;

    let file = SmokeConfig::load(cli.config.as_deref())?;
    let config = cli.resolve_config(file, |key| std::env::var(key).ok());

    if let Err(e) = run(&cli, config).await {
        if e.is_target_failure() {
            tracing::error!("Application under test failed the check: {}", e);
        } else {
            tracing::error!("Smoke run aborted: {}", e);
        }
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: &Cli, config: SmokeConfig) -> Result<(), SmokeError> {
    let scenario = AuthScenario::from_config(&config)?;
    let request_timeout = config.navigation_timeout();
    tracing::info!("Target application: {}", scenario.urls().register.origin().ascii_serialization());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let report = BrowserSession::scoped(&config.browser, request_timeout, move |page| async move {
                scenario.run(&page).await
            })
            .await?;

            if cli.json {
                let json = serde_json::to_string_pretty(&report)
                    .map_err(|e| SmokeError::Io(std::io::Error::other(e)))?;
                println!("{}", json);
            } else {
                println!(
                    "Registered and logged in as {} <{}>; screenshot saved to {}",
                    report.username,
                    report.email,
                    report.screenshot.display()
                );
            }
        }
        Command::Guard => {
            let landed = BrowserSession::scoped(&config.browser, request_timeout, move |page| async move {
                scenario.verify_guard(&page).await
            })
            .await?;

            if cli.json {
                println!("{}", serde_json::json!({ "redirected_to": landed }));
            } else {
                println!("Unauthenticated access redirected to {}", landed);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FILE: &str = r#"
        base_url = "http://file.test:3000"
        navigation_timeout_ms = 1000

        [screenshot]
        path = "file.png"
    "#;

    fn env(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key: &str| vars.get(key).map(|v| v.to_string())
    }

    fn file_config() -> SmokeConfig {
        SmokeConfig::from_toml(FILE).unwrap()
    }

    #[test]
    fn test_file_values_survive_without_overrides() {
        let cli = Cli::try_parse_from(["auth-smoke"]).unwrap();
        let config = cli.resolve_config(file_config(), env(&[]));
        assert_eq!(config.base_url, "http://file.test:3000");
        assert_eq!(config.screenshot.path, PathBuf::from("file.png"));
        assert_eq!(config.navigation_timeout_ms, 1000);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_env_overrides_file() {
        let cli = Cli::try_parse_from(["auth-smoke"]).unwrap();
        let config = cli.resolve_config(
            file_config(),
            env(&[("SMOKE_BASE_URL", "http://env.test:4000"), ("SMOKE_SCREENSHOT", "env.png")]),
        );
        assert_eq!(config.base_url, "http://env.test:4000");
        assert_eq!(config.screenshot.path, PathBuf::from("env.png"));
    }

    #[test]
    fn test_flags_override_env_and_file() {
        let cli = Cli::try_parse_from([
            "auth-smoke",
            "--base-url",
            "http://cli.test:5000",
            "--screenshot",
            "cli.png",
            "--timeout-ms",
            "2500",
            "--headed",
            "--no-sandbox",
            "--chrome",
            "/opt/chrome",
            "--run-scoped-screenshot",
        ])
        .unwrap();
        let config = cli.resolve_config(
            file_config(),
            env(&[
                ("SMOKE_BASE_URL", "http://env.test:4000"),
                ("SMOKE_SCREENSHOT", "env.png"),
                ("SMOKE_CHROME", "/usr/bin/env-chrome"),
            ]),
        );
        assert_eq!(config.base_url, "http://cli.test:5000");
        assert_eq!(config.screenshot.path, PathBuf::from("cli.png"));
        assert_eq!(config.navigation_timeout_ms, 2500);
        assert_eq!(config.browser.chrome_executable, Some(PathBuf::from("/opt/chrome")));
        assert!(!config.browser.headless);
        assert!(!config.browser.sandbox);
        assert!(config.screenshot.run_scoped);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["auth-smoke", "guard", "--base-url", "http://cli.test"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Guard)));
        let config = cli.resolve_config(SmokeConfig::default(), env(&[("SMOKE_BASE_URL", "http://env.test")]));
        assert_eq!(config.base_url, "http://cli.test");
    }

    #[test]
    fn test_logging_flags() {
        let cli = Cli::try_parse_from(["auth-smoke", "--log-level", "debug", "--log-dir", "logs"]).unwrap();
        let logging = cli.logging_config();
        assert_eq!(logging.log_level.as_deref(), Some("debug"));
        assert_eq!(logging.log_dir, Some(PathBuf::from("logs")));
    }
}
