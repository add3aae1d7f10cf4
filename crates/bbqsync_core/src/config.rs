//! Environment-driven runtime configuration.
//!
//! Blank or unset variables fall back to defaults; values are only trimmed
//! here and validated by their consumers (`init_logging`, `open_db`).

use crate::logging::default_log_level;
use crate::model::room::RoomId;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "BBQSYNC_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "BBQSYNC_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "BBQSYNC_LOG_DIR";
pub const ROOM_ENV: &str = "BBQSYNC_ROOM";

const DEFAULT_DB_FILE_NAME: &str = "bbqsync.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "bbqsync-logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub room_id: RoomId,
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: read(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: read(LOG_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME)),
            room_id: RoomId::parse(read(ROOM_ENV).as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DB_PATH_ENV, LOG_LEVEL_ENV, ROOM_ENV};
    use crate::logging::default_log_level;
    use crate::model::room::DEFAULT_ROOM_ID;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> CoreConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let config = config_from(&[(DB_PATH_ENV, "   ")]);
        assert_eq!(config.db_path, std::env::temp_dir().join("bbqsync.sqlite3"));
        assert_eq!(config.log_level, default_log_level());
        assert_eq!(config.room_id.as_str(), DEFAULT_ROOM_ID);
    }

    #[test]
    fn explicit_values_are_trimmed_and_room_is_sanitized() {
        let config = config_from(&[
            (DB_PATH_ENV, " /tmp/rooms.db "),
            (LOG_LEVEL_ENV, "warn"),
            (ROOM_ENV, "team/a"),
        ]);
        assert_eq!(config.db_path, PathBuf::from("/tmp/rooms.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.room_id.as_str(), "team-a");
    }
}
