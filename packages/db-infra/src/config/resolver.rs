use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::db::{parse_tls_flag, DatabaseConfig, Dialect};
use super::env::EnvVars;
use super::file::ConfigFile;
use super::fixed::FixedDbConfig;
use crate::error::DbInfraError;

/// Which layer produced the resolved config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Fixed,
    Environment,
    File,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSource::Fixed => "fixed configuration block",
            ConfigSource::Environment => "environment",
            ConfigSource::File => "config file",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub config: DatabaseConfig,
    pub source: ConfigSource,
}

/// Environment variable names for one dialect.
struct EnvKeys {
    host: &'static str,
    port: &'static str,
    user: &'static str,
    password: &'static str,
    database: &'static str,
    tls: &'static str,
}

const POSTGRES_KEYS: EnvKeys = EnvKeys {
    host: "POSTGRES_HOST",
    port: "POSTGRES_PORT",
    user: "POSTGRES_USER",
    password: "POSTGRES_PASSWORD",
    database: "POSTGRES_DATABASE",
    tls: "POSTGRES_SSL",
};

const MYSQL_KEYS: EnvKeys = EnvKeys {
    host: "MYSQL_HOST",
    port: "MYSQL_PORT",
    user: "MYSQL_USER",
    password: "MYSQL_PASSWORD",
    database: "MYSQL_DATABASE",
    tls: "MYSQL_SSL",
};

/// Layered config lookup: fixed block, then env (Postgres before MySQL), then
/// the persisted file. First usable source wins.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    fixed: FixedDbConfig,
    env: EnvVars,
    file: PathBuf,
}

impl ConfigResolver {
    pub fn new(fixed: FixedDbConfig, env: EnvVars, file: impl Into<PathBuf>) -> Self {
        Self {
            fixed,
            env,
            file: file.into(),
        }
    }

    pub fn config_file(&self) -> &Path {
        &self.file
    }

    /// `Ok(None)` means no source produced a config, which the caller reports
    /// as "configuration missing" rather than a connection problem.
    pub fn resolve(&self) -> Result<Option<ResolvedConfig>, DbInfraError> {
        if let Some(config) = self.fixed.to_config() {
            debug!(source = "fixed", dialect = %config.dialect, "config_resolved");
            return Ok(Some(ResolvedConfig {
                config,
                source: ConfigSource::Fixed,
            }));
        }

        for (dialect, keys) in [
            (Dialect::Postgres, &POSTGRES_KEYS),
            (Dialect::MySql, &MYSQL_KEYS),
        ] {
            if let Some(config) = self.from_env(dialect, keys)? {
                debug!(source = "env", dialect = %dialect, "config_resolved");
                return Ok(Some(ResolvedConfig {
                    config,
                    source: ConfigSource::Environment,
                }));
            }
        }

        if let Some(ConfigFile { db: Some(config), .. }) = ConfigFile::load(&self.file)? {
            debug!(source = "file", dialect = %config.dialect, path = %self.file.display(), "config_resolved");
            return Ok(Some(ResolvedConfig {
                config,
                source: ConfigSource::File,
            }));
        }

        debug!(path = %self.file.display(), "config_absent");
        Ok(None)
    }

    fn from_env(
        &self,
        dialect: Dialect,
        keys: &EnvKeys,
    ) -> Result<Option<DatabaseConfig>, DbInfraError> {
        let (Some(host), Some(user), Some(database)) = (
            self.env.get(keys.host),
            self.env.get(keys.user),
            self.env.get(keys.database),
        ) else {
            return Ok(None);
        };

        let port = match self.env.get(keys.port) {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| {
                DbInfraError::invalid_config(format!("{} must be a port number, got '{raw}'", keys.port))
            })?),
            None => None,
        };

        Ok(Some(DatabaseConfig {
            dialect,
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: self.env.get_or(keys.password, "").to_string(),
            database: database.to_string(),
            use_tls: self.env.get(keys.tls).is_some_and(parse_tls_flag),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::ConfigFile;

    fn pg_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("POSTGRES_HOST", "pg.internal"),
            ("POSTGRES_USER", "gabinete"),
            ("POSTGRES_PASSWORD", "pw"),
            ("POSTGRES_DATABASE", "gabinete_plus"),
        ]
    }

    fn resolver(env: EnvVars, dir: &tempfile::TempDir) -> ConfigResolver {
        ConfigResolver::new(FixedDbConfig::EMPTY, env, dir.path().join("config.json"))
    }

    #[test]
    fn nothing_configured_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolver(EnvVars::empty(), &dir).resolve().unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn fixed_block_wins_when_dialect_set() {
        let dir = tempfile::tempdir().unwrap();
        let fixed = FixedDbConfig {
            dialect: Some(Dialect::MySql),
            host: "fixed.host",
            user: "root",
            database: "gabinete",
            ..FixedDbConfig::EMPTY
        };
        let r = ConfigResolver::new(fixed, EnvVars::from_pairs(pg_env()), dir.path().join("c.json"));

        let resolved = r.resolve().unwrap().unwrap();
        assert_eq!(resolved.source, ConfigSource::Fixed);
        assert_eq!(resolved.config.dialect, Dialect::MySql);
        assert_eq!(resolved.config.host, "fixed.host");
    }

    #[test]
    fn fixed_block_without_dialect_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let fixed = FixedDbConfig {
            host: "ignored",
            ..FixedDbConfig::EMPTY
        };
        let r = ConfigResolver::new(fixed, EnvVars::from_pairs(pg_env()), dir.path().join("c.json"));
        assert_eq!(r.resolve().unwrap().unwrap().source, ConfigSource::Environment);
    }

    #[test]
    fn postgres_env_is_checked_before_mysql() {
        let dir = tempfile::tempdir().unwrap();
        let mut pairs = pg_env();
        pairs.extend([
            ("MYSQL_HOST", "my.internal"),
            ("MYSQL_USER", "root"),
            ("MYSQL_DATABASE", "gabinete"),
        ]);

        let resolved = resolver(EnvVars::from_pairs(pairs), &dir)
            .resolve()
            .unwrap()
            .unwrap();
        assert_eq!(resolved.config.dialect, Dialect::Postgres);
        assert_eq!(resolved.config.effective_port(), 5432);
    }

    #[test]
    fn partial_postgres_env_falls_through_to_mysql() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvVars::from_pairs([
            ("POSTGRES_HOST", "pg.internal"),
            ("MYSQL_HOST", "my.internal"),
            ("MYSQL_PORT", "3307"),
            ("MYSQL_USER", "root"),
            ("MYSQL_DATABASE", "gabinete"),
            ("MYSQL_SSL", "true"),
        ]);

        let cfg = resolver(env, &dir).resolve().unwrap().unwrap().config;
        assert_eq!(cfg.dialect, Dialect::MySql);
        assert_eq!(cfg.effective_port(), 3307);
        assert!(cfg.use_tls);
        assert_eq!(cfg.password, "");
    }

    #[test]
    fn tls_flag_coerced_from_env_strings() {
        let dir = tempfile::tempdir().unwrap();
        for (raw, expected) in [
            ("1", true),
            ("true", true),
            ("TRUE", false),
            (" true", false),
            ("yes", false),
            ("0", false),
        ] {
            let mut pairs = pg_env();
            pairs.push(("POSTGRES_SSL", raw));
            let cfg = resolver(EnvVars::from_pairs(pairs), &dir)
                .resolve()
                .unwrap()
                .unwrap()
                .config;
            assert_eq!(cfg.use_tls, expected, "POSTGRES_SSL={raw}");
        }
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut pairs = pg_env();
        pairs.push(("POSTGRES_PORT", "fifty"));

        let err = resolver(EnvVars::from_pairs(pairs), &dir).resolve().unwrap_err();
        assert!(matches!(err, DbInfraError::InvalidConfig { .. }));
        assert!(err.to_string().contains("POSTGRES_PORT"));
    }

    #[test]
    fn file_is_the_last_resort() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile {
            db: Some(DatabaseConfig::new(Dialect::Postgres, "file.host", "u", "p", "d").with_tls(true)),
            push: None,
        };
        file.write(&dir.path().join("config.json")).unwrap();

        let resolved = resolver(EnvVars::empty(), &dir).resolve().unwrap().unwrap();
        assert_eq!(resolved.source, ConfigSource::File);
        assert_eq!(resolved.config.host, "file.host");

        let resolved = resolver(EnvVars::from_pairs(pg_env()), &dir)
            .resolve()
            .unwrap()
            .unwrap();
        assert_eq!(resolved.source, ConfigSource::Environment);
    }
}
