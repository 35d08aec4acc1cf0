//! Download, decode and count a set of contents files.
//!
//! Every url gets a fetch task. As soon as a fetch finishes a decode task is
//! started for that file, which cuts the decoded lines into batches. Every
//! batch is handed back to the coordinator and mapped on its own blocking
//! task. All of them live in one [`JoinSet`] that keeps growing while the
//! coordinator is waiting on it, the run is done once the set is empty and
//! no batch is left in the channel.

use crate::contents;
use crate::decompress;
use crate::fetch::{Fetched, Fetcher};
use crate::stats::PackageCounts;
use contentstat_common::config::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_DOWNLOADS, DEFAULT_PARSE_WORKERS};
use contentstat_common::errors::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Consecutive lines of one decoded file.
#[derive(Debug)]
pub struct Batch {
    pub source: Arc<Path>,
    /// Position of the batch within its file, starting at 0
    pub index: usize,
    pub lines: Vec<String>,
}

/// Work done for every batch, runs on the blocking thread pool.
pub trait BatchMapper: Send + Sync + 'static {
    fn map(&self, batch: Batch);
}

/// Parses every line and adds the owning packages to the counts.
#[derive(Debug, Clone)]
pub struct CountPackages {
    counts: PackageCounts,
}

impl CountPackages {
    pub fn new(counts: PackageCounts) -> Self {
        CountPackages { counts }
    }
}

impl BatchMapper for CountPackages {
    fn map(&self, batch: Batch) {
        let mut local = HashMap::<&str, u64>::new();
        let mut skipped = 0;

        for line in &batch.lines {
            match contents::parse(line) {
                Ok(packages) => {
                    for package in packages {
                        *local.entry(package).or_insert(0) += 1;
                    }
                }
                Err(err) => {
                    debug!("Skipping line in {:?}: {}", batch.source, err);
                    skipped += 1;
                }
            }
        }

        trace!(
            "Merging batch #{} of {:?} ({} packages, {} skipped)",
            batch.index,
            batch.source,
            local.len(),
            skipped
        );
        self.counts.merge(local);
        if skipped > 0 {
            self.counts.add_skipped(skipped);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    Idle,
    FetchingAll,
    ProcessingAll,
    Done,
    Failed,
}

/// What happened during a run, failures of single files are collected here.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub downloaded: usize,
    pub cached: usize,
    pub files_processed: usize,
    pub batches: usize,
    pub lines: u64,
    pub fetch_failures: Vec<FetchFailure>,
    pub decode_failures: Vec<DecodeFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed_files(&self) -> usize {
        self.fetch_failures.len() + self.decode_failures.len()
    }
}

enum Completion {
    Fetched {
        url: String,
        result: Result<Fetched, FetchFailure>,
    },
    Decoded {
        path: PathBuf,
        lines: u64,
        result: Result<(), DecodeFailure>,
    },
    Mapped,
}

pub struct Pipeline {
    fetcher: Fetcher,
    mapper: Arc<dyn BatchMapper>,
    batch_size: usize,
    max_downloads: usize,
    parse_workers: usize,
    state: Mutex<State>,
}

impl Pipeline {
    pub fn new(fetcher: Fetcher, counts: PackageCounts) -> Pipeline {
        Pipeline::with_mapper(fetcher, Arc::new(CountPackages::new(counts)))
    }

    pub fn with_mapper(fetcher: Fetcher, mapper: Arc<dyn BatchMapper>) -> Pipeline {
        Pipeline {
            fetcher,
            mapper,
            batch_size: DEFAULT_BATCH_SIZE,
            max_downloads: DEFAULT_MAX_DOWNLOADS,
            parse_workers: DEFAULT_PARSE_WORKERS,
            state: Mutex::new(State::Idle),
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Pipeline {
        self.batch_size = batch_size.max(1);
        self
    }

    /// 0 allows every download to run at the same time
    pub fn max_downloads(mut self, max_downloads: usize) -> Pipeline {
        self.max_downloads = max_downloads;
        self
    }

    pub fn parse_workers(mut self, parse_workers: usize) -> Pipeline {
        self.parse_workers = parse_workers.max(1);
        self
    }

    /// Where the most recent run is, `Done` once every task has finished.
    pub fn state(&self) -> State {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, next: State) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        debug!("Pipeline state {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Process all urls and wait for every task that got spawned on the way.
    ///
    /// Dropping the returned future aborts all downloads that are still running.
    pub async fn run(&self, urls: Vec<String>) -> Result<RunSummary> {
        self.transition(State::Idle);
        match self.run_inner(urls).await {
            Ok(summary) => {
                self.transition(State::Done);
                Ok(summary)
            }
            Err(err) => {
                self.transition(State::Failed);
                Err(err)
            }
        }
    }

    async fn run_inner(&self, urls: Vec<String>) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let mut tasks = JoinSet::new();
        let (tx, mut rx) = mpsc::channel::<Batch>(self.parse_workers * 2);
        let parse_permits = Arc::new(Semaphore::new(self.parse_workers));
        let download_permits = if self.max_downloads > 0 {
            Some(Arc::new(Semaphore::new(self.max_downloads)))
        } else {
            None
        };

        self.transition(State::FetchingAll);
        let mut pending_fetches = urls.len();
        for url in urls {
            let fetcher = self.fetcher.clone();
            let permits = download_permits.clone();
            tasks.spawn(async move {
                let _permit = match permits {
                    Some(permits) => permits.acquire_owned().await.ok(),
                    None => None,
                };
                let result = fetcher.fetch(&url).await;
                Completion::Fetched { url, result }
            });
        }
        if pending_fetches == 0 {
            self.transition(State::ProcessingAll);
        }

        // a batch is only taken off the channel once a parse worker is free,
        // waiting for one never blocks completions of other tasks
        let mut permit: Option<OwnedSemaphorePermit> = None;
        loop {
            if tasks.is_empty() {
                // every producer is gone, only leftovers in the channel remain
                match rx.try_recv() {
                    Ok(batch) => {
                        let permit = match permit.take() {
                            Some(permit) => permit,
                            None => Self::acquire(&parse_permits).await?,
                        };
                        self.spawn_batch(&mut tasks, permit, batch);
                        continue;
                    }
                    Err(_) => break,
                }
            }

            tokio::select! {
                biased;
                Some(joined) = tasks.join_next() => {
                    match joined.context("Pipeline task failed")? {
                        Completion::Fetched { url, result } => {
                            pending_fetches -= 1;
                            match result {
                                Ok(fetched) => {
                                    if let Fetched::Cached { .. } = fetched {
                                        summary.cached += 1;
                                    } else {
                                        summary.downloaded += 1;
                                    }
                                    self.spawn_decode(&mut tasks, &tx, fetched.into_path());
                                }
                                Err(err) => {
                                    warn!("Skipping {:?}: {}", url, err);
                                    summary.fetch_failures.push(err);
                                }
                            }
                            if pending_fetches == 0 {
                                self.transition(State::ProcessingAll);
                            }
                        }
                        Completion::Decoded { path, lines, result } => {
                            summary.lines += lines;
                            match result {
                                Ok(()) => {
                                    debug!("Finished reading {:?} ({} lines)", path, lines);
                                    summary.files_processed += 1;
                                }
                                Err(err) => {
                                    warn!("Skipping rest of {:?}: {}", path, err);
                                    summary.decode_failures.push(err);
                                }
                            }
                        }
                        Completion::Mapped => {
                            summary.batches += 1;
                        }
                    }
                }
                acquired = Self::acquire(&parse_permits), if permit.is_none() => {
                    permit = Some(acquired?);
                }
                Some(batch) = rx.recv(), if permit.is_some() => {
                    if let Some(permit) = permit.take() {
                        self.spawn_batch(&mut tasks, permit, batch);
                    }
                }
            }
        }

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    fn spawn_decode(&self, tasks: &mut JoinSet<Completion>, tx: &mpsc::Sender<Batch>, path: PathBuf) {
        let tx = tx.clone();
        let batch_size = self.batch_size;
        tasks.spawn_blocking(move || {
            let (lines, result) = decode_batches(&path, batch_size, &tx);
            Completion::Decoded { path, lines, result }
        });
    }

    async fn acquire(permits: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
        permits
            .clone()
            .acquire_owned()
            .await
            .context("Parse workers are gone")
    }

    fn spawn_batch(&self, tasks: &mut JoinSet<Completion>, permit: OwnedSemaphorePermit, batch: Batch) {
        let mapper = self.mapper.clone();
        tasks.spawn_blocking(move || {
            mapper.map(batch);
            drop(permit);
            Completion::Mapped
        });
    }
}

/// Read a file and send its lines in batches, returns the number of lines read.
fn decode_batches(
    path: &Path,
    batch_size: usize,
    tx: &mpsc::Sender<Batch>,
) -> (u64, Result<(), DecodeFailure>) {
    let reader = match decompress::open(path) {
        Ok(reader) => reader,
        Err(err) => return (0, Err(err)),
    };
    info!("Processing {:?}", path);

    let source: Arc<Path> = Arc::from(path);
    let mut lines = 0;
    let mut index = 0;
    let mut buf = Vec::with_capacity(batch_size);

    let send = |index: usize, buf: Vec<String>| {
        let batch = Batch {
            source: source.clone(),
            index,
            lines: buf,
        };
        // only fails if the run was cancelled
        tx.blocking_send(batch).is_ok()
    };

    for line in reader {
        let line = match line {
            Ok(line) => line,
            Err(err) => return (lines, Err(err)),
        };
        lines += 1;
        buf.push(line);

        if buf.len() >= batch_size {
            let full = std::mem::replace(&mut buf, Vec::with_capacity(batch_size));
            if !send(index, full) {
                return (lines, Ok(()));
            }
            index += 1;
        }
    }

    if !buf.is_empty() {
        send(index, buf);
    }

    (lines, Ok(()))
}
