use crate::errors::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MIRROR: &str = "http://ftp.uk.debian.org/debian/dists/stable/main/";
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 5000;
pub const DEFAULT_MAX_DOWNLOADS: usize = 4;
pub const DEFAULT_PARSE_WORKERS: usize = 8;
pub const DEFAULT_HTTP_TIMEOUT: u64 = 10;

pub const SECS_PER_DAY: u64 = 86400;

pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<ConfigFile> {
    let mut config = ConfigFile::default();

    if let Some(c) = load_from("/etc/contentstat.conf")? {
        config.update(c);
    }

    if let Ok(path) = config_path() {
        if let Some(c) = load_from(path)? {
            config.update(c);
        }
    }

    if let Some(path) = path {
        let c = load_from(path.as_ref())?
            .ok_or_else(|| format_err!("Failed to read config file: {:?}", path.as_ref()))?;
        config.update(c);
    }

    Ok(config)
}

fn config_path() -> Result<PathBuf> {
    let config_dir = dirs_next::config_dir()
        .ok_or_else(|| format_err!("Failed to find config dir"))?;
    Ok(config_dir.join("contentstat.conf"))
}

fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<ConfigFile>> {
    if let Ok(buf) = fs::read_to_string(path.as_ref()) {
        debug!("loading config file {:?}", path.as_ref());
        let config = toml::from_str(&buf)
            .with_context(|| anyhow!("Failed to load config from {:?}", path.as_ref()))?;
        Ok(Some(config))
    } else {
        Ok(None)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub contents: ContentsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl ConfigFile {
    pub fn update(&mut self, c: ConfigFile) {
        self.contents.update(c.contents);
        self.http.update(c.http);
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ContentsConfig {
    pub mirror_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub skip_download: Option<u64>,
    pub limit: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_downloads: Option<usize>,
    pub parse_workers: Option<usize>,
}

impl ContentsConfig {
    pub fn update(&mut self, c: ContentsConfig) {
        if c.mirror_url.is_some() {
            self.mirror_url = c.mirror_url;
        }
        if c.output_dir.is_some() {
            self.output_dir = c.output_dir;
        }
        if c.skip_download.is_some() {
            self.skip_download = c.skip_download;
        }
        if c.limit.is_some() {
            self.limit = c.limit;
        }
        if c.batch_size.is_some() {
            self.batch_size = c.batch_size;
        }
        if c.max_downloads.is_some() {
            self.max_downloads = c.max_downloads;
        }
        if c.parse_workers.is_some() {
            self.parse_workers = c.parse_workers;
        }
    }

    pub fn mirror_url(&self) -> &str {
        self.mirror_url.as_deref().unwrap_or(DEFAULT_MIRROR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Freshness window in days, 0 means always download
    pub fn skip_download(&self) -> u64 {
        self.skip_download.unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1)
    }

    /// 0 means no limit
    pub fn max_downloads(&self) -> usize {
        self.max_downloads.unwrap_or(DEFAULT_MAX_DOWNLOADS)
    }

    pub fn parse_workers(&self) -> usize {
        self.parse_workers.unwrap_or(DEFAULT_PARSE_WORKERS).max(1)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout: Option<u64>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn update(&mut self, c: HttpConfig) {
        if c.timeout.is_some() {
            self.timeout = c.timeout;
        }
        if c.user_agent.is_some() {
            self.user_agent = c.user_agent;
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT)
    }

    pub fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("contentstat/{}", env!("CARGO_PKG_VERSION")))
    }
}
