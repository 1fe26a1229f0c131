use db_infra::config::EnvVars;

use crate::error::AppError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `HOST` and `PORT`, with defaults. A non-numeric `PORT` is an error.
    pub fn from_env(env: &EnvVars) -> Result<Self, AppError> {
        let host = env.get_or("HOST", DEFAULT_HOST).to_string();
        let port = match env.get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                AppError::internal(format!("PORT must be a valid port number, got '{raw}'"))
            })?,
        };
        Ok(Self { host, port })
    }
}
