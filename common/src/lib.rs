use std::collections::BTreeMap;

pub mod config;
pub mod errors;
pub mod http;
pub mod utils;

/// One retrievable contents index on a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// The href as it showed up in the directory listing
    pub name: String,
    /// Absolute url of the file
    pub link: String,
    /// Set for indices of installer (udeb) packages
    pub udeb: bool,
}

/// Contents files of a mirror grouped by architecture.
pub type Listing = BTreeMap<String, Vec<FileDescriptor>>;
