//! Per-file upload options.
//!
//! A file-option set is a list of `aws s3 cp` style flags, for example
//! `["--exclude", "*", "--include", "*.html", "--cache-control", "max-age=0"]`.
//! Each configured set drives one extra scoped copy pass before the
//! authoritative sync. Sets are carried verbatim between functions and only
//! interpreted here.

use std::path::Path;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::contract::ValidationError;

pub const CHECKSUM_METADATA_KEY: &str = "sha256";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileOptionSet {
    flags: Vec<String>,
}

impl FileOptionSet {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: flags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn parse(&self) -> Result<CopyOptions, ValidationError> {
        let mut options = CopyOptions::default();
        let mut flags = self.flags.iter();

        while let Some(flag) = flags.next() {
            let (name, inline_value) = match flag.split_once('=') {
                Some((name, value)) if name.starts_with("--") => (name, Some(value.to_string())),
                _ => (flag.as_str(), None),
            };
            let mut value = || -> Result<String, ValidationError> {
                match inline_value.clone() {
                    Some(value) => Ok(value),
                    None => flags.next().cloned().ok_or_else(|| {
                        ValidationError::new(format!("file option {name} requires a value"))
                    }),
                }
            };

            match name {
                "--exclude" => options.filter.push(FilterKind::Exclude, &value()?)?,
                "--include" => options.filter.push(FilterKind::Include, &value()?)?,
                "--cache-control" => options.headers.cache_control = Some(value()?),
                "--content-type" => options.headers.content_type = Some(value()?),
                "--content-encoding" => options.headers.content_encoding = Some(value()?),
                "--content-disposition" => options.headers.content_disposition = Some(value()?),
                "--content-language" => options.headers.content_language = Some(value()?),
                "--expires" => options.headers.expires = Some(value()?),
                // Headers are always replaced on copy.
                "--metadata-directive" => {
                    value()?;
                }
                other => {
                    return Err(ValidationError::new(format!(
                        "unsupported file option '{other}'"
                    )));
                }
            }
        }

        Ok(options)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub filter: PathFilter,
    pub headers: ObjectHeaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Include,
    Exclude,
}

/// Ordered include/exclude filter. Later rules take precedence and paths
/// are included when no rule matches.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    rules: Vec<(FilterKind, GlobMatcher)>,
}

impl PathFilter {
    pub fn push(&mut self, kind: FilterKind, pattern: &str) -> Result<(), ValidationError> {
        let matcher = Glob::new(pattern)
            .map_err(|error| ValidationError::new(format!("invalid pattern '{pattern}': {error}")))?
            .compile_matcher();
        self.rules.push((kind, matcher));
        Ok(())
    }

    pub fn matches(&self, relative_path: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|(_, matcher)| matcher.is_match(relative_path))
            .map(|(kind, _)| *kind == FilterKind::Include)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectHeaders {
    pub cache_control: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub content_language: Option<String>,
    pub expires: Option<String>,
}

impl ObjectHeaders {
    /// Headers with the content type filled in from the file extension when
    /// none was configured.
    pub fn for_file(&self, path: &Path) -> Self {
        let mut headers = self.clone();
        if headers.content_type.is_none() {
            headers.content_type = guess_content_type(path).map(str::to_string);
        }
        headers
    }
}

pub fn guess_content_type(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "csv" => "text/csv",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/vnd.microsoft.icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "webmanifest" => "application/manifest+json",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        _ => return None,
    };
    Some(content_type)
}

pub fn content_checksum(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}
