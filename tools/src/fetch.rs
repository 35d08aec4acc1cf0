use chrono::{DateTime, Utc};
use contentstat_common::config::SECS_PER_DAY;
use contentstat_common::errors::*;
use contentstat_common::http::{Client, StatusCode};
use contentstat_common::utils;
use futures_util::StreamExt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use url::Url;

/// Source of the current time for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Name of the file the url is stored as, the last segment of its path.
pub fn filename_from_url(url_str: &str) -> Result<String, FetchFailure> {
    let url = url_str
        .parse::<Url>()
        .map_err(|err| FetchFailure::new(url_str, FetchCause::InvalidUrl(err.to_string())))?;

    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if filename.is_empty() {
        return Err(FetchFailure::new(
            url_str,
            FetchCause::InvalidUrl("url has no filename".to_string()),
        ));
    }

    Ok(filename.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Downloaded { path: PathBuf, bytes: u64 },
    Cached { path: PathBuf },
}

impl Fetched {
    pub fn into_path(self) -> PathBuf {
        match self {
            Fetched::Downloaded { path, .. } => path,
            Fetched::Cached { path } => path,
        }
    }
}

/// A download in progress, removed again unless it's persisted.
///
/// Failed downloads are discarded explicitly, dropping the guard only
/// cleans up after a cancelled fetch.
struct PartialFile {
    path: PathBuf,
    file: File,
    finished: bool,
}

impl PartialFile {
    async fn create(path: PathBuf) -> io::Result<PartialFile> {
        let file = File::create(&path).await?;
        Ok(PartialFile {
            path,
            file,
            finished: false,
        })
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.file.write_all(buf).await
    }

    async fn persist(mut self, target: &Path) -> io::Result<()> {
        let result = match self.file.flush().await {
            Ok(()) => fs::rename(&self.path, target).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.finished = true;
                Ok(())
            }
            Err(err) => {
                self.discard().await;
                Err(err)
            }
        }
    }

    async fn discard(mut self) {
        debug!("Removing partial download {:?}", self.path);
        if let Err(err) = fs::remove_file(&self.path).await {
            warn!("Failed to remove partial download {:?}: {}", self.path, err);
        }
        self.finished = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Removing partial download {:?}", self.path);
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove partial download {:?}: {}", self.path, err);
            }
        }
    }
}

/// Downloads urls into a directory, reusing files that are fresh enough.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    output_dir: PathBuf,
    freshness_days: u64,
    clock: Arc<dyn Clock>,
}

impl Fetcher {
    pub fn new<P: Into<PathBuf>>(client: Client, output_dir: P, freshness_days: u64) -> Fetcher {
        Fetcher {
            client,
            output_dir: output_dir.into(),
            freshness_days,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Fetcher {
        self.clock = clock;
        self
    }

    pub fn destination(&self, url: &str) -> Result<PathBuf, FetchFailure> {
        let filename = filename_from_url(url)?;
        Ok(self.output_dir.join(filename))
    }

    async fn is_fresh(&self, path: &Path) -> bool {
        if self.freshness_days == 0 {
            return false;
        }

        let modified = match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata.modified(),
            _ => return false,
        };
        let modified = match modified {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(err) => {
                debug!("Failed to read mtime of {:?}: {}", path, err);
                return false;
            }
        };

        let age = self.clock.now().signed_duration_since(modified);
        let window = (self.freshness_days.saturating_mul(SECS_PER_DAY))
            .saturating_mul(1000)
            .min(i64::MAX as u64) as i64;
        age.num_milliseconds() < window
    }

    /// Make sure the url is available on disk and return its path.
    ///
    /// Only a `200 OK` is accepted, there are no retries.
    pub async fn fetch(&self, url: &str) -> Result<Fetched, FetchFailure> {
        let target = self.destination(url)?;

        if self.is_fresh(&target).await {
            info!(
                "Using cached {:?}, it's newer than {} day(s)",
                target, self.freshness_days
            );
            return Ok(Fetched::Cached { path: target });
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|err| FetchFailure::new(url, err))?;

        info!("Downloading {:?} to {:?}", url, target);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchFailure::new(url, err))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchFailure::new(url, FetchCause::Status(status.as_u16())));
        }

        let filename = filename_from_url(url)?;
        let partial_path = self.output_dir.join(format!(".{}.part", filename));
        let mut partial = PartialFile::create(partial_path)
            .await
            .map_err(|err| FetchFailure::new(url, err))?;

        let written = async {
            let mut stream = response.bytes_stream();
            let mut bytes = 0;
            while let Some(item) = stream.next().await {
                let item = item.map_err(|err| FetchFailure::new(url, err))?;
                partial
                    .write_all(&item)
                    .await
                    .map_err(|err| FetchFailure::new(url, err))?;
                bytes += item.len() as u64;
            }
            Ok::<_, FetchFailure>(bytes)
        }
        .await;

        let bytes = match written {
            Ok(bytes) => bytes,
            Err(err) => {
                partial.discard().await;
                return Err(err);
            }
        };

        partial
            .persist(&target)
            .await
            .map_err(|err| FetchFailure::new(url, err))?;
        info!("Downloaded {} to {:?}", utils::bytes_to_human(bytes), target);

        Ok(Fetched::Downloaded {
            path: target,
            bytes,
        })
    }
}
