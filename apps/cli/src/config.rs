//! 配置文件查找
//!
//! 优先使用 `--config` 指定的文件；否则读取 `<config_dir>/rdk/config.toml`
//! （存在时），都没有则使用默认配置。

use anyhow::{Context, Result};
use rdk_sdk::SessionConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 用户配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rdk").join("config.toml"))
}

pub fn resolve(explicit: Option<&Path>) -> Result<SessionConfig> {
    if let Some(path) = explicit {
        debug!("Loading config from {}", path.display());
        return SessionConfig::load(path).context("invalid configuration");
    }

    match default_config_path() {
        Some(path) if path.is_file() => {
            debug!("Loading config from {}", path.display());
            SessionConfig::load(&path)
                .with_context(|| format!("invalid configuration in {}", path.display()))
        },
        _ => Ok(SessionConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "request_timeout_ms = 250\n[readiness]\nmax_polls = 3").unwrap();

        let config = resolve(Some(file.path())).unwrap();
        assert_eq!(config.request_timeout_ms, 250);
        assert_eq!(config.readiness.max_polls, 3);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = resolve(Some(Path::new("/nonexistent/rdk.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }

    #[test]
    fn test_default_path_layout() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("rdk/config.toml"));
        }
    }
}
