//! Deterministic on-disk naming for stored content.
//!
//! ```text
//! <root>/<slug(page_type)>/<sanitized(location)>.<digest>.<ext>
//! ```
//!
//! `digest` is the first 12 hex chars of SHA-256 over `location` and
//! `page_type`, so distinct references never share a file even when their
//! sanitized names collide.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use ladle_shared::{ContentKind, SourceReference};

/// Longest sanitized location kept in a file name.
const MAX_NAME_LEN: usize = 80;

/// Hex chars of the reference digest kept in a file name.
const DIGEST_LEN: usize = 12;

/// Path of the primary artifact for `source` under `root`.
pub fn primary_path(root: &Path, source: &SourceReference, kind: ContentKind) -> PathBuf {
    let file_name = format!(
        "{}.{}.{}",
        sanitize_location(&source.location),
        reference_digest(source),
        kind.extension()
    );
    root.join(slugify(&source.page_type)).join(file_name)
}

/// Backup file name for `primary`, with a UTC timestamp and sequence number.
pub fn backup_path(primary: &Path, seq: u32) -> PathBuf {
    let name = primary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    primary.with_file_name(format!("{name}.{stamp}-{seq:03}.bak"))
}

/// True if `candidate` is a backup of `primary`.
pub fn is_backup_of(primary: &Path, candidate: &Path) -> bool {
    let (Some(primary_name), Some(name)) = (primary.file_name(), candidate.file_name()) else {
        return false;
    };
    let prefix = format!("{}.", primary_name.to_string_lossy());
    let name = name.to_string_lossy();
    name.starts_with(&prefix) && name.ends_with(".bak")
}

/// Turn a URL or path into a filesystem-safe name.
///
/// Scheme prefixes and a trailing slash are dropped; every other
/// non-alphanumeric run becomes a single `-`.
pub fn sanitize_location(location: &str) -> String {
    let mut trimmed = location;
    for prefix in ["https://", "http://", "file://"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            trimmed = rest;
            break;
        }
    }
    let trimmed = trimmed.trim_end_matches('/');

    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }

    let mut out = out.trim_matches('-').to_string();
    if out.len() > MAX_NAME_LEN {
        out.truncate(MAX_NAME_LEN);
        out = out.trim_end_matches('-').to_string();
    }

    if out.is_empty() {
        "index".to_string()
    } else {
        out
    }
}

/// Generate a directory-safe slug from a page type.
pub(crate) fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "untyped".to_string()
    } else {
        slug
    }
}

fn reference_digest(source: &SourceReference) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.location.as_bytes());
    hasher.update(b"\n");
    hasher.update(source.page_type.as_bytes());
    let hex = format!("{:x}", hasher.finalize());
    hex[..DIGEST_LEN].to_string()
}
