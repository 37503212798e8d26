use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILE: &str = "auth-smoke.log";

/// Logging options given on the command line. Unset fields fall back to
/// the environment, then to console-only `info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_level: Option<String>,
    /// Enables the daily-rolling file log in this directory.
    pub log_dir: Option<PathBuf>,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLogging {
    pub filter: String,
    pub file: Option<(PathBuf, String)>,
}

impl LoggingConfig {
    /// Level: flag, `RUST_LOG`, `SMOKE_LOG_LEVEL`, `info`.
    /// File: flag or `SMOKE_LOG_DIR`; name from flag, `SMOKE_LOG_FILE`, default.
    pub fn resolve<F>(self, lookup: F) -> ResolvedLogging
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = self
            .log_level
            .or_else(|| lookup("RUST_LOG"))
            .or_else(|| lookup("SMOKE_LOG_LEVEL"))
            .unwrap_or_else(|| "info".to_string());

        let log_file = self.log_file;
        let file = self
            .log_dir
            .or_else(|| lookup("SMOKE_LOG_DIR").map(PathBuf::from))
            .map(|dir| {
                let name = log_file
                    .or_else(|| lookup("SMOKE_LOG_FILE"))
                    .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
                (dir, name)
            });

        ResolvedLogging { filter, file }
    }
}

pub fn init_logging(
    config: LoggingConfig,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let resolved = config.resolve(|key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&resolved.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let Some((log_dir, log_file)) = resolved.file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
        return Ok(None);
    };

    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_target(true),
        )
        .try_init()?;

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key: &str| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults_are_console_info() {
        let resolved = LoggingConfig::default().resolve(env(&[]));
        assert_eq!(resolved.filter, "info");
        assert!(resolved.file.is_none());
    }

    #[test]
    fn test_flag_level_beats_environment() {
        let config = LoggingConfig {
            log_level: Some("debug".to_string()),
            ..LoggingConfig::default()
        };
        let resolved = config.resolve(env(&[("RUST_LOG", "warn"), ("SMOKE_LOG_LEVEL", "error")]));
        assert_eq!(resolved.filter, "debug");
    }

    #[test]
    fn test_rust_log_beats_smoke_level() {
        let resolved = LoggingConfig::default().resolve(env(&[("RUST_LOG", "warn"), ("SMOKE_LOG_LEVEL", "error")]));
        assert_eq!(resolved.filter, "warn");
    }

    #[test]
    fn test_log_dir_from_env_enables_file() {
        let resolved = LoggingConfig::default().resolve(env(&[("SMOKE_LOG_DIR", "/var/log/smoke")]));
        assert_eq!(
            resolved.file,
            Some((PathBuf::from("/var/log/smoke"), DEFAULT_LOG_FILE.to_string()))
        );
    }

    #[test]
    fn test_flag_dir_and_file_name() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("logs")),
            log_file: Some("run.log".to_string()),
            ..LoggingConfig::default()
        };
        let resolved = config.resolve(env(&[("SMOKE_LOG_DIR", "/elsewhere"), ("SMOKE_LOG_FILE", "other.log")]));
        assert_eq!(resolved.file, Some((PathBuf::from("logs"), "run.log".to_string())));
    }
}
