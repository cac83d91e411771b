use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context};
use client_core::BaasConfig;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "wordbook.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub redirect_to: Option<String>,
    pub session_file: Option<PathBuf>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub session_file: Option<PathBuf>,
}

pub fn load_settings(config_file: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_file) {
        settings.apply_file(&raw);
    }
    settings.apply_env(|key| std::env::var(key).ok());

    settings
}

impl Settings {
    pub fn apply_file(&mut self, raw: &str) {
        let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
            tracing::warn!("ignoring unreadable config file");
            return;
        };
        if let Some(v) = file_cfg.get("supabase_url") {
            self.supabase_url = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("supabase_anon_key") {
            self.supabase_anon_key = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("redirect_to") {
            self.redirect_to = Some(v.clone());
        }
        if let Some(v) = file_cfg.get("session_file") {
            self.session_file = Some(PathBuf::from(v));
        }
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("SUPABASE_URL") {
            self.supabase_url = Some(v);
        }
        if let Some(v) = var("APP__SUPABASE_URL") {
            self.supabase_url = Some(v);
        }

        if let Some(v) = var("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(v);
        }
        if let Some(v) = var("APP__SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(v);
        }

        if let Some(v) = var("APP__REDIRECT_TO") {
            self.redirect_to = Some(v);
        }
        if let Some(v) = var("APP__SESSION_FILE") {
            self.session_file = Some(PathBuf::from(v));
        }
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.supabase_url {
            self.supabase_url = Some(v);
        }
        if let Some(v) = overrides.supabase_anon_key {
            self.supabase_anon_key = Some(v);
        }
        if let Some(v) = overrides.session_file {
            self.session_file = Some(v);
        }
    }

    pub fn baas_config(&self) -> anyhow::Result<BaasConfig> {
        let url = self.supabase_url.as_deref().map(str::trim).unwrap_or_default();
        let key = self
            .supabase_anon_key
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if url.is_empty() || key.is_empty() {
            return Err(anyhow!("Supabase URL and anon key are required"));
        }
        BaasConfig::new(url, key).with_context(|| format!("invalid Supabase URL '{url}'"))
    }

    /// Where the signed-in session is kept between runs.
    pub fn session_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.session_file {
            return Ok(path.clone());
        }
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("unable to resolve user config dir"))?;
        Ok(base.join("wordbook").join("session.json"))
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
