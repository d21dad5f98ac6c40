use std::path::{Path, PathBuf};

use kgrec_algo::{MasteryConfig, OutcomePolicy, RankingConfig};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub file_logs: bool,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
    pub strict_outcomes: bool,
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logs: false,
            log_dir: PathBuf::from("./logs"),
            data_dir: PathBuf::from("."),
            strict_outcomes: false,
        }
    }
}

impl Config {
    /// Read once at startup; commands receive the struct explicitly
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_level = std::env::var("RUST_LOG").unwrap_or(defaults.log_level);
        let file_logs = env_flag("ENABLE_FILE_LOGS").unwrap_or(defaults.file_logs);
        let log_dir = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);
        let data_dir = std::env::var("KGREC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let strict_outcomes = env_flag("KGREC_STRICT_OUTCOMES").unwrap_or(defaults.strict_outcomes);

        Self {
            log_level,
            file_logs,
            log_dir,
            data_dir,
            strict_outcomes,
        }
    }

    /// Relative paths are taken from the data directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn mastery_config(&self) -> MasteryConfig {
        MasteryConfig {
            outcome_policy: if self.strict_outcomes {
                OutcomePolicy::Strict
            } else {
                OutcomePolicy::Lenient
            },
        }
    }

    pub fn ranking_config(&self) -> RankingConfig {
        RankingConfig::default()
    }
}
