use crate::fetch::Fetcher;
use crate::pipeline::{Pipeline, RunSummary};
use crate::stats::PackageCounts;
use contentstat_common::config::ContentsConfig;
use contentstat_common::errors::*;
use contentstat_common::http::Client;
use std::collections::HashMap;

pub mod args;
pub mod contents;
pub mod decompress;
pub mod fetch;
pub mod listing;
pub mod pipeline;
pub mod report;
pub mod stats;

/// Which contents files of the mirror should be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Architecture { name: String, include_udeb: bool },
    All,
}

#[derive(Debug)]
pub struct PackageStats {
    pub counts: HashMap<String, u64>,
    pub skipped_lines: u64,
    pub summary: RunSummary,
}

/// Resolve the selected contents files on the mirror, then download and count them.
pub async fn package_stats(
    http: &Client,
    config: &ContentsConfig,
    selection: &Selection,
) -> Result<PackageStats> {
    let mirror_url = config.mirror_url();
    let links = listing::list_files(http, mirror_url).await?;
    let files = listing::classify(mirror_url, links);

    let urls = match selection {
        Selection::Architecture { name, include_udeb } => {
            let urls = listing::select(&files, name, *include_udeb);
            if urls.is_empty() {
                let known = files.keys().map(String::as_str).collect::<Vec<_>>();
                warn!(
                    "No contents files for architecture {:?} on mirror, available: {}",
                    name,
                    known.join(", ")
                );
            }
            urls
        }
        Selection::All => listing::select_all(&files),
    };
    debug!("Selected urls: {:?}", urls);

    let counts = PackageCounts::new();
    let fetcher = Fetcher::new(http.clone(), config.output_dir(), config.skip_download());
    let summary = Pipeline::new(fetcher, counts.clone())
        .batch_size(config.batch_size())
        .max_downloads(config.max_downloads())
        .parse_workers(config.parse_workers())
        .run(urls)
        .await?;

    Ok(PackageStats {
        counts: counts.snapshot(),
        skipped_lines: counts.skipped(),
        summary,
    })
}
