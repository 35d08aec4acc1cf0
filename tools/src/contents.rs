//! Parsing of individual `Contents` index lines.
//!
//! Every line maps a path to a comma separated list of packages that ship it,
//! `usr/bin/ls    utils/coreutils`. The path itself may contain spaces, so
//! the package list is always the last whitespace separated token.

use contentstat_common::errors::ParseFailure;

/// Path token used by the archive for entries that are owned by nobody.
pub const EMPTY_PACKAGE: &str = "EMPTY_PACKAGE";

#[derive(Debug, PartialEq, Eq)]
pub struct Record<'a> {
    pub path: &'a str,
    pub packages: Vec<&'a str>,
}

/// Parse one line into its path and owning packages.
///
/// Returns `Ok(None)` for blank lines, they are not records.
pub fn parse_record(line: &str) -> Result<Option<Record<'_>>, ParseFailure> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let idx = line
        .rfind(char::is_whitespace)
        .ok_or_else(|| ParseFailure {
            line: line.to_string(),
        })?;
    let (path, packages) = line.split_at(idx);
    let path = path.trim_end();
    // still starts with the separator
    let packages = packages.trim_start();

    if path == EMPTY_PACKAGE {
        return Ok(Some(Record {
            path,
            packages: Vec::new(),
        }));
    }

    Ok(Some(Record {
        path,
        packages: packages.split(',').collect(),
    }))
}

/// The packages owning the path on this line, duplicates are kept.
pub fn parse(line: &str) -> Result<Vec<&str>, ParseFailure> {
    Ok(parse_record(line)?
        .map(|record| record.packages)
        .unwrap_or_default())
}
