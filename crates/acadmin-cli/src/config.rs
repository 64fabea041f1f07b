// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acadmin_api::DEFAULT_TIMEOUT;
use acadmin_app::DEFAULT_PAGE_SIZE;
use acadmin_tui::TuiOptions;
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "acadmin";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
const MAX_PAGE_SIZE: u32 = 100;
const LOG_FILE_NAME: &str = "acadmin.log";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub search_debounce: Option<String>,
    pub reveal_interval: Option<String>,
    pub typing_interval: Option<String>,
    pub chat_topic: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ACADMIN_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ACADMIN_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!(
                "api.base_url in {} is empty; remove it to use ACADMIN_API_URL or set a URL",
                path.display()
            );
        }

        if let Some(page_size) = self.api.page_size
            && !(1..=MAX_PAGE_SIZE).contains(&page_size)
        {
            bail!(
                "api.page_size in {} must be between 1 and {MAX_PAGE_SIZE}, got {page_size}",
                path.display()
            );
        }

        let durations = [
            ("api.timeout", &self.api.timeout),
            ("ui.search_debounce", &self.ui.search_debounce),
            ("ui.reveal_interval", &self.ui.reveal_interval),
            ("ui.typing_interval", &self.ui.typing_interval),
        ];
        for (key, raw) in durations {
            let Some(raw) = raw else {
                continue;
            };
            let parsed = parse_duration(raw).with_context(|| format!("{key} in {}", path.display()))?;
            if parsed <= Duration::ZERO {
                bail!(
                    "{key} in {} must be positive, got {raw}",
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// The API root: the config value, then `ACADMIN_API_URL`, then the
    /// local development default.
    pub fn base_url(&self) -> String {
        let configured = self
            .api
            .base_url
            .clone()
            .or_else(|| env::var("ACADMIN_API_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        configured.trim().trim_end_matches('/').to_owned()
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        match &self.api.timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.api.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn tui_options(&self) -> Result<TuiOptions> {
        let defaults = TuiOptions::default();
        Ok(TuiOptions {
            page_size: self.page_size(),
            search_debounce: duration_or(&self.ui.search_debounce, defaults.search_debounce)?,
            reveal_interval: duration_or(&self.ui.reveal_interval, defaults.reveal_interval)?,
            typing_interval: duration_or(&self.ui.typing_interval, defaults.typing_interval)?,
            chat_topic: self
                .ui
                .chat_topic
                .clone()
                .filter(|topic| !topic.trim().is_empty()),
        })
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match &self.log.path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(crate::session_store::data_dir()?.join(LOG_FILE_NAME)),
        }
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# acadmin config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# ACADMIN_API_URL is used when base_url is not set here.\nbase_url = \"{}\"\ntimeout = \"30s\"\npage_size = {}\n\n[ui]\nsearch_debounce = \"500ms\"\nreveal_interval = \"20ms\"\ntyping_interval = \"500ms\"\n# chat_topic = \"advising\"\n\n[log]\n# Optional. Default is the platform data dir (for example ~/.local/share/acadmin/acadmin.log)\n# path = \"/absolute/path/to/acadmin.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_PAGE_SIZE,
        )
    }
}

fn duration_or(raw: &Option<String>, default: Duration) -> Result<Duration> {
    match raw {
        Some(raw) => parse_duration(raw),
        None => Ok(default),
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("duration {raw:?} is too large"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}
