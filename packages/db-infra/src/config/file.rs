//! Persisted configuration file written by the one-time setup action.
//!
//! Layout: a flat JSON object with a `db` object (the `DatabaseConfig` shape)
//! and an unrelated `push` object holding web-push credentials. The file is
//! always written wholesale, never merged.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::db::DatabaseConfig;
use crate::error::DbInfraError;

pub const CONFIG_FILE_ENV: &str = "GABINETE_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// VAPID credentials for web push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushCredentials {
    pub public_key: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<DatabaseConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushCredentials>,
}

impl ConfigFile {
    /// Load the file at `path`.
    ///
    /// A missing file is `Ok(None)`. Invalid JSON is an error. A `db` or `push`
    /// object that does not match its shape is dropped with a warning, so an
    /// incomplete `db` reads as "no config" rather than a hard failure.
    pub fn load(path: &Path) -> Result<Option<Self>, DbInfraError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(file_error(path, e.to_string())),
        };

        let value: Value =
            serde_json::from_str(&raw).map_err(|e| file_error(path, e.to_string()))?;
        let Value::Object(mut obj) = value else {
            return Err(file_error(path, "expected a JSON object".to_string()));
        };

        let db = obj
            .remove("db")
            .and_then(|v| match serde_json::from_value::<DatabaseConfig>(v) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config_file db section ignored");
                    None
                }
            });
        let push = obj
            .remove("push")
            .and_then(|v| match serde_json::from_value::<PushCredentials>(v) {
                Ok(push) => Some(push),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "config_file push section ignored");
                    None
                }
            });

        Ok(Some(Self { db, push }))
    }

    /// Replace the file at `path` with this config.
    ///
    /// Writes to a sibling temp file first and renames it into place so a
    /// concurrent reader never sees a half-written file.
    pub fn write(&self, path: &Path) -> Result<(), DbInfraError> {
        let body =
            serde_json::to_string_pretty(self).map_err(|e| file_error(path, e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| file_error(path, e.to_string()))?;
        }

        let tmp = tmp_path(path);
        std::fs::write(&tmp, body).map_err(|e| file_error(path, e.to_string()))?;
        std::fs::rename(&tmp, path).map_err(|e| file_error(path, e.to_string()))?;
        Ok(())
    }
}

/// Location of the config file: `GABINETE_CONFIG_FILE` or `config.json`.
pub fn config_file_path(env: &super::env::EnvVars) -> PathBuf {
    PathBuf::from(env.get_or(CONFIG_FILE_ENV, DEFAULT_CONFIG_FILE))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn file_error(path: &Path, message: String) -> DbInfraError {
    DbInfraError::ConfigFile {
        path: path.display().to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::db::Dialect;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ConfigFile::load(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, DbInfraError::ConfigFile { .. }));
    }

    #[test]
    fn incomplete_db_section_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"db":{"dialect":"postgres"},"push":{"publicKey":"pk","privateKey":"sk"}}"#,
        )
        .unwrap();

        let loaded = ConfigFile::load(&path).unwrap().unwrap();
        assert!(loaded.db.is_none());
        assert_eq!(loaded.push.unwrap().public_key, "pk");
    }

    #[test]
    fn write_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let first = ConfigFile {
            db: Some(DatabaseConfig::new(Dialect::Postgres, "h", "u", "p", "d")),
            push: Some(PushCredentials {
                public_key: "pk".into(),
                private_key: "sk".into(),
                subject: None,
            }),
        };
        first.write(&path).unwrap();

        let second = ConfigFile {
            db: Some(DatabaseConfig::new(Dialect::MySql, "h2", "u2", "p2", "d2")),
            push: None,
        };
        second.write(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap().unwrap();
        assert_eq!(loaded, second);
        assert!(!tmp_path(&path).exists());
    }
}
