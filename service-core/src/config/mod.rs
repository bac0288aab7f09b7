use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 3000;

/// Listener settings shared by every service binary.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub port: u16,
}

impl Config {
    /// Layered load: built-in default, optional `configuration.*` file,
    /// `APP__*` variables, then a bare `PORT` which wins over everything.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .set_default("port", DEFAULT_PORT as i64)?
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .set_override_option("port", std::env::var("PORT").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}
