
use crate::data::*;
use crate::fixtures::server::{Mirror, MirrorServer};
use contentstat_common::config::{ContentsConfig, HttpConfig};
use contentstat_common::http::{self, Client};
use rstest::fixture;
use tempfile::TempDir;

#[fixture]
pub fn http_client() -> Client {
    let _ = env_logger::builder().is_test(true).try_init();
    http::client(&HttpConfig::default()).expect("Failed to setup http client")
}

#[fixture]
pub fn download_dir() -> TempDir {
    TempDir::new().expect("Failed to create download directory")
}

/// A mirror with a plain and an udeb index for arch1 and a plain one for arch2.
#[fixture]
pub fn mirror_server() -> MirrorServer {
    let mirror = Mirror::new()
        .with_file(CONTENTS_UDEB_ARCH1, gzip(UDEB_ARCH1_CONTENTS))
        .with_file(CONTENTS_ARCH1, gzip(ARCH1_CONTENTS))
        .with_file(CONTENTS_ARCH2, gzip(ARCH2_CONTENTS));
    MirrorServer::start(mirror).expect("Failed to start test mirror")
}

pub fn contents_config(server: &MirrorServer, download_dir: &TempDir) -> ContentsConfig {
    ContentsConfig {
        mirror_url: Some(server.mirror_url()),
        output_dir: Some(download_dir.path().to_path_buf()),
        ..Default::default()
    }
}
