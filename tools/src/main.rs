use clap::Parser;
use colored::*;
use contentstat::args::Args;
use contentstat::{report, Selection};
use contentstat_common::errors::*;
use contentstat_common::{config, http, utils};
use env_logger::Env;
use std::io;
use std::io::prelude::*;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let logging = match args.verbose {
        0 => "info",
        1 => "contentstat=debug,contentstat_common=debug,info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::init_from_env(Env::default().default_filter_or(logging));

    if args.color {
        debug!("Bypass tty detection and always use colors");
        colored::control::set_override(true);
    }

    let mut config = config::load(args.config.as_ref()).context("Failed to load config file")?;
    args.update_config(&mut config.contents);

    let selection = if let Some(name) = &args.architecture {
        Selection::Architecture {
            name: name.clone(),
            include_udeb: args.udeb,
        }
    } else {
        Selection::All
    };

    let http = http::client(&config.http)?;
    let stats = tokio::select! {
        stats = contentstat::package_stats(&http, &config.contents, &selection) => stats?,
        _ = signal::ctrl_c() => {
            bail!("Interrupted, partial downloads have been removed");
        }
    };

    for failure in &stats.summary.fetch_failures {
        eprintln!("{} {}", "Skipped:".yellow().bold(), failure);
    }
    for failure in &stats.summary.decode_failures {
        eprintln!("{} {}", "Skipped:".yellow().bold(), failure);
    }

    let mut stdout = io::stdout();
    let table = report::format_table(&stats.counts, args.order(), config.contents.limit());
    writeln!(stdout, "{}", table)?;
    if let Some(footer) = report::format_summary(&stats.summary, stats.skipped_lines) {
        writeln!(stdout, "\n{}", footer)?;
    }

    info!(
        "Finished in {} ({} downloaded, {} cached, {} lines)",
        utils::duration_to_human(stats.summary.elapsed).trim_start(),
        stats.summary.downloaded,
        stats.summary.cached,
        stats.summary.lines,
    );

    Ok(())
}
