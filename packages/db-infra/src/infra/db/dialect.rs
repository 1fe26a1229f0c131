//! Per-dialect behavior: connection URL, placeholder syntax, introspection,
//! schema source. Everything above this module is written once against
//! `Dialect`.

use std::borrow::Cow;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sea_orm::DatabaseBackend;

use crate::config::db::{DatabaseConfig, Dialect};

const POSTGRES_SCHEMA: &str = include_str!("../../../schema/postgres.sql");
const MYSQL_SCHEMA: &str = include_str!("../../../schema/mysql.sql");

impl Dialect {
    pub fn backend(self) -> DatabaseBackend {
        match self {
            Dialect::Postgres => DatabaseBackend::Postgres,
            Dialect::MySql => DatabaseBackend::MySql,
        }
    }

    /// Connection URL for the sqlx driver behind sea-orm.
    pub fn connect_url(self, cfg: &DatabaseConfig) -> String {
        let user = utf8_percent_encode(&cfg.user, NON_ALPHANUMERIC);
        let password = utf8_percent_encode(&cfg.password, NON_ALPHANUMERIC);
        let database = &cfg.database;
        let port = cfg.effective_port();

        match self {
            Dialect::Postgres => {
                let sslmode = if cfg.use_tls { "require" } else { "disable" };
                format!(
                    "postgres://{user}:{password}@{}:{port}/{database}?sslmode={sslmode}",
                    cfg.host
                )
            }
            Dialect::MySql => {
                let ssl_mode = if cfg.use_tls { "REQUIRED" } else { "DISABLED" };
                format!(
                    "mysql://{user}:{password}@{}:{port}/{database}?ssl-mode={ssl_mode}",
                    cfg.host
                )
            }
        }
    }

    /// Rewrite `?` placeholders into the dialect's syntax.
    ///
    /// Postgres numbers placeholders: each `?` becomes `$1`, `$2`, ... left to
    /// right. A `?` inside a string literal is rewritten too; callers must not
    /// put literal question marks in SQL text.
    pub fn translate_query<'a>(self, sql: &'a str) -> Cow<'a, str> {
        match self {
            Dialect::MySql => Cow::Borrowed(sql),
            Dialect::Postgres => {
                if !sql.contains('?') {
                    return Cow::Borrowed(sql);
                }
                let mut out = String::with_capacity(sql.len() + 8);
                let mut index = 0usize;
                for ch in sql.chars() {
                    if ch == '?' {
                        index += 1;
                        out.push('$');
                        out.push_str(&index.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                Cow::Owned(out)
            }
        }
    }

    /// Introspection query returning one row with an integer `cnt` column that
    /// is non-zero when the table named by the single `?` parameter exists.
    pub fn table_exists_sql(self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT COUNT(*) AS cnt FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = ?"
            }
            Dialect::MySql => {
                "SELECT COUNT(*) AS cnt FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
            }
        }
    }

    pub fn schema_source(self) -> &'static str {
        match self {
            Dialect::Postgres => POSTGRES_SCHEMA,
            Dialect::MySql => MYSQL_SCHEMA,
        }
    }
}
