#![cfg(test)]

use crate::data::*;
use crate::fixtures::server::{Mirror, MirrorServer};
use crate::fixtures::*;
use contentstat::fetch::Fetcher;
use contentstat::report::{self, Order};
use contentstat::{package_stats, PackageStats, Selection};
use contentstat_common::config::ContentsConfig;
use contentstat_common::http::Client;
use rstest::rstest;
use std::collections::HashMap;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) mod fixtures;

fn arch(name: &str, include_udeb: bool) -> Selection {
    Selection::Architecture {
        name: name.to_string(),
        include_udeb,
    }
}

fn counts_of(items: &[(&str, u64)]) -> HashMap<String, u64> {
    items.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

async fn run(http: &Client, config: &ContentsConfig, selection: &Selection) -> PackageStats {
    package_stats(http, config, selection)
        .await
        .expect("Failed to collect package stats")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn counts_selected_architecture_without_udeb(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;

    assert_eq!(stats.counts, counts_of(&[("pkg1", 2), ("pkg2", 1)]));
    assert_eq!(stats.skipped_lines, 0);
    assert_eq!(stats.summary.downloaded, 1);
    assert_eq!(stats.summary.failed_files(), 0);
    assert_eq!(mirror_server.hits(CONTENTS_ARCH1), 1);
    assert_eq!(mirror_server.hits(CONTENTS_UDEB_ARCH1), 0);
    assert_eq!(mirror_server.hits(CONTENTS_ARCH2), 0);
    assert!(download_dir.path().join(CONTENTS_ARCH1).is_file());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn counts_udeb_when_requested(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, true)).await;

    assert_eq!(
        stats.counts,
        counts_of(&[("pkg1", 2), ("pkg2", 1), ("debian-installer/udeb1", 1)])
    );
    assert_eq!(stats.summary.downloaded, 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn counts_duplicates_and_skips_malformed_lines(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &arch(DUMMY_OTHER_ARCHITECTURE, false)).await;

    assert_eq!(stats.counts, counts_of(&[("admin/pkgA", 2)]));
    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(
        report::format_summary(&stats.summary, stats.skipped_lines).as_deref(),
        Some("1 malformed line(s) skipped")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn counts_all_architectures(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &Selection::All).await;

    assert_eq!(
        stats.counts,
        counts_of(&[
            ("pkg1", 2),
            ("pkg2", 1),
            ("debian-installer/udeb1", 1),
            ("admin/pkgA", 2),
        ])
    );
    assert_eq!(stats.summary.downloaded, 3);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn unknown_architecture_counts_nothing(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &arch("arch3", true)).await;

    assert!(stats.counts.is_empty());
    assert_eq!(
        report::format_table(&stats.counts, Order::Descending, 10),
        format!("{:50} \t File Count", "Package")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn report_ranks_counted_packages(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    let stats = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, true)).await;
    let table = report::format_table(&stats.counts, Order::Descending, 2);

    let expected = [
        format!("{:50} \t File Count", "Package"),
        format!("{:50} \t 2", "pkg1"),
        format!("{:50} \t 1", "debian-installer/udeb1"),
    ]
    .join("\n");
    assert_eq!(table, expected);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn fresh_download_is_reused(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = ContentsConfig {
        skip_download: Some(10),
        ..contents_config(&mirror_server, &download_dir)
    };

    let first = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;
    assert_eq!(first.summary.downloaded, 1);

    let second = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;
    assert_eq!(second.summary.downloaded, 0);
    assert_eq!(second.summary.cached, 1);
    assert_eq!(second.counts, first.counts);

    assert_eq!(mirror_server.hits(CONTENTS_ARCH1), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn zero_freshness_downloads_every_time(
    http_client: Client,
    download_dir: TempDir,
    mirror_server: MirrorServer,
) {
    let config = contents_config(&mirror_server, &download_dir);

    run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;
    let second = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;

    assert_eq!(second.summary.downloaded, 1);
    assert_eq!(second.summary.cached, 0);
    assert_eq!(mirror_server.hits(CONTENTS_ARCH1), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn missing_file_does_not_stop_the_run(http_client: Client, download_dir: TempDir) {
    let mirror = Mirror::new()
        .with_missing_file(CONTENTS_UDEB_ARCH1)
        .with_file(CONTENTS_ARCH1, gzip(ARCH1_CONTENTS));
    let server = MirrorServer::start(mirror).unwrap();
    let config = contents_config(&server, &download_dir);

    let stats = run(&http_client, &config, &arch(DUMMY_ARCHITECTURE, true)).await;

    assert_eq!(stats.counts, counts_of(&[("pkg1", 2), ("pkg2", 1)]));
    assert_eq!(stats.summary.fetch_failures.len(), 1);
    let failure = &stats.summary.fetch_failures[0];
    assert_eq!(failure.url, server.file_url(CONTENTS_UDEB_ARCH1));
    assert_eq!(failure.status(), Some(404));
    assert!(!download_dir.path().join(CONTENTS_UDEB_ARCH1).exists());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn corrupt_file_is_reported(http_client: Client, download_dir: TempDir) {
    let mut corrupt = gzip(ARCH1_CONTENTS);
    let n = corrupt.len();
    corrupt[n - 6] = !corrupt[n - 6];
    let mirror = Mirror::new()
        .with_file(CONTENTS_ARCH1, corrupt)
        .with_file(CONTENTS_ARCH2, gzip(ARCH2_CONTENTS));
    let server = MirrorServer::start(mirror).unwrap();
    let config = contents_config(&server, &download_dir);

    let stats = run(&http_client, &config, &Selection::All).await;

    assert_eq!(stats.summary.decode_failures.len(), 1);
    assert_eq!(
        stats.summary.decode_failures[0].path,
        download_dir.path().join(CONTENTS_ARCH1)
    );
    assert_eq!(stats.counts.get("admin/pkgA"), Some(&2));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn unreachable_mirror_is_fatal(http_client: Client, download_dir: TempDir) {
    let config = ContentsConfig {
        mirror_url: Some("http://127.0.0.1:1/debian/dists/stable/main/".to_string()),
        output_dir: Some(download_dir.path().to_path_buf()),
        ..Default::default()
    };

    let result = package_stats(&http_client, &config, &arch(DUMMY_ARCHITECTURE, false)).await;
    assert!(result.is_err());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
pub async fn cancelled_download_leaves_no_file(http_client: Client, download_dir: TempDir) {
    let mirror = Mirror::new().with_stalled_file(CONTENTS_ARCH1, b"\x1f\x8b partial".to_vec());
    let server = MirrorServer::start(mirror).unwrap();

    let fetcher = Fetcher::new(http_client, download_dir.path(), 10);
    let url = server.file_url(CONTENTS_ARCH1);
    let result = tokio::time::timeout(Duration::from_millis(500), fetcher.fetch(&url)).await;
    assert!(result.is_err(), "stalled download should not finish");

    let leftovers = fs::read_dir(download_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
    assert_eq!(server.hits(CONTENTS_ARCH1), 1);
}
