// Application settings, loaded with the 'config' crate and 'dotenv'

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, builder::DefaultState, ConfigBuilder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server_address: String,
    // Hosted backend endpoint, e.g. https://xyz.supabase.co
    pub supabase_url: String,
    // Public (anon) API key sent with every backend request
    pub supabase_anon_key: String,
    // When present, access tokens are verified locally before the identity lookup
    pub supabase_jwt_secret: Option<String>,
    pub session_ttl_secs: u64,
    pub search_session_ttl_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            // Load from a configuration file (e.g., config.toml)
            .add_source(File::with_name("config").required(false))
            // Load from environment variables (e.g., APP_SUPABASE_URL)
            .add_source(Environment::with_prefix("APP").prefix_separator("_"));

        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("session_ttl_secs", 300)?
            .set_default("search_session_ttl_secs", 1800)?
            .build()?
            .try_deserialize()
            .context("Missing or invalid configuration (APP_SUPABASE_URL and APP_SUPABASE_ANON_KEY are required)")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.supabase_url.trim().is_empty() {
            bail!("supabase_url must not be empty");
        }
        if self.supabase_anon_key.trim().is_empty() {
            bail!("supabase_anon_key must not be empty");
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        self.supabase_jwt_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
    }
}

#[cfg(test)]
pub fn test_settings() -> Settings {
    Settings {
        server_address: "127.0.0.1:0".to_string(),
        supabase_url: "http://backend.test".to_string(),
        supabase_anon_key: "anon-key".to_string(),
        supabase_jwt_secret: None,
        session_ttl_secs: 60,
        search_session_ttl_secs: 60,
    }
}
