use crate::report::Order;
use clap::{ArgAction, Parser};
use contentstat_common::config::ContentsConfig;
use std::path::PathBuf;

/// File count statistics of debian packages for an architecture
#[derive(Debug, Parser)]
#[command(version)]
pub struct Args {
    /// Verbose logging
    #[arg(short, long, action(ArgAction::Count))]
    pub verbose: u8,
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Bypass tty detection and always use colors
    #[arg(short = 'C', long)]
    pub color: bool,
    /// Architecture of the packages to parse
    #[arg(required_unless_present = "all_architectures")]
    pub architecture: Option<String>,
    /// Mirror url of the contents files
    #[arg(short, long = "mirror_url", visible_alias = "mirror-url")]
    pub mirror_url: Option<String>,
    /// Include the udeb contents file of the architecture
    #[arg(short, long)]
    pub udeb: bool,
    /// Number of packages to show, the ones with the most files first
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Download location for contents files [default: ./downloads]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Skip downloads of files that are newer than this many days, 0 always downloads
    #[arg(short, long)]
    pub skip_download: Option<u64>,
    /// Show the packages with the least files first
    #[arg(long)]
    pub ascending: bool,
    /// Count the contents files of every architecture
    #[arg(long, conflicts_with = "architecture")]
    pub all_architectures: bool,
    /// Number of lines that are parsed as one unit of work
    #[arg(long)]
    pub batch_size: Option<usize>,
    /// Number of concurrent downloads, 0 for no limit
    #[arg(short = 'j', long)]
    pub max_downloads: Option<usize>,
}

impl Args {
    /// Flags given on the command line win over the config file.
    pub fn update_config(&self, config: &mut ContentsConfig) {
        config.update(ContentsConfig {
            mirror_url: self.mirror_url.clone(),
            output_dir: self.output_dir.clone(),
            skip_download: self.skip_download,
            limit: self.limit,
            batch_size: self.batch_size,
            max_downloads: self.max_downloads,
            parse_workers: None,
        });
    }

    pub fn order(&self) -> Order {
        if self.ascending {
            Order::Ascending
        } else {
            Order::Descending
        }
    }
}
