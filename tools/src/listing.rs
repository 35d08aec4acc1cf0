use contentstat_common::errors::*;
use contentstat_common::http::Client;
use contentstat_common::{FileDescriptor, Listing};
use regex::Regex;

/// An anchor of the directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

impl Link {
    pub fn new<T: Into<String>, H: Into<String>>(text: T, href: H) -> Link {
        Link {
            text: text.into(),
            href: href.into(),
        }
    }
}

/// Fetch the directory listing of the mirror and return all of its links.
///
/// Not being able to reach the mirror at all is an error, there is nothing
/// to work on without the listing.
pub async fn list_files(http: &Client, mirror_url: &str) -> Result<Vec<Link>> {
    info!("Downloading directory list from {}", mirror_url);
    let directory_list = http
        .get(mirror_url)
        .send()
        .await
        .with_context(|| anyhow!("Failed to reach mirror {:?}", mirror_url))?
        .error_for_status()
        .with_context(|| anyhow!("Failed to fetch directory list from {:?}", mirror_url))?
        .text()
        .await?;

    let links = extract_links(&directory_list)?;
    debug!("Found {} links in directory list", links.len());
    Ok(links)
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

pub fn extract_links(html: &str) -> Result<Vec<Link>> {
    let anchor = Regex::new(
        r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#,
    )?;
    let tag = Regex::new(r"(?s)<[^>]*>")?;

    let links = anchor
        .captures_iter(html)
        .map(|cap| {
            let href = cap
                .get(1)
                .or_else(|| cap.get(2))
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let text = tag.replace_all(&cap[4], "");
            Link::new(decode_entities(text.trim()), decode_entities(href))
        })
        .collect();

    Ok(links)
}

fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, file)
    } else {
        format!("{}/{}", base, file)
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Group the gzip compressed files of a listing by their architecture.
///
/// The architecture is the last dash separated token of the file name,
/// `Contents-udeb-arm64.gz` is the udeb index of `arm64`.
pub fn classify(mirror_url: &str, links: Vec<Link>) -> Listing {
    let mut files = Listing::new();

    for link in links {
        if !link.href.ends_with(".gz") {
            continue;
        }

        let tokens = strip_extension(&link.text).split('-').collect::<Vec<_>>();
        let arch = tokens.last().copied().unwrap_or_default().to_string();
        let udeb = tokens.contains(&"udeb");

        trace!("Classified {:?} as arch={:?}, udeb={}", link.text, arch, udeb);
        files.entry(arch).or_default().push(FileDescriptor {
            link: join_url(mirror_url, &link.text),
            name: link.href,
            udeb,
        });
    }

    files
}

/// Urls of the files of an architecture, udeb indices only if requested.
pub fn select(files: &Listing, arch: &str, include_udeb: bool) -> Vec<String> {
    files
        .get(arch)
        .map(|files| {
            files
                .iter()
                .filter(|file| include_udeb || !file.udeb)
                .map(|file| file.link.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Urls of every file of every architecture.
pub fn select_all(files: &Listing) -> Vec<String> {
    files
        .values()
        .flatten()
        .map(|file| file.link.clone())
        .collect()
}
