//! Publishing an extracted tree to its destination prefix.
//!
//! Each configured file-option set runs one scoped copy pass over the files
//! it selects, uploading them with its headers. The sync pass that follows
//! uploads every file whose content differs from the stored object and, in
//! mirror mode, deletes objects under the prefix that have no local
//! counterpart. Files uploaded by a copy pass already carry a matching
//! checksum, so the sync leaves their headers alone.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use site_deploy_core::contract::{PublishTarget, SourceArchive, SyncMode};
use site_deploy_core::destination::{listing_prefix, object_key, relative_key, s3_url};
use site_deploy_core::file_options::{content_checksum, ObjectHeaders};
use tracing::info;
use walkdir::WalkDir;

use crate::adapters::object_store::ObjectStore;
use crate::adapters::AdapterError;
use crate::error::DeployError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// `/`-separated path relative to the tree root.
    pub relative: String,
    pub path: PathBuf,
    pub size: u64,
    pub checksum: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub copied: usize,
    pub uploaded: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

pub async fn publish(
    store: &dyn ObjectStore,
    directory: &Path,
    target: &PublishTarget,
) -> Result<PublishSummary, DeployError> {
    let destination = s3_url(&target.bucket, &target.prefix);
    let publish_error = |error: AdapterError| DeployError::publish(&destination, error);

    let root = directory.to_path_buf();
    let files = tokio::task::spawn_blocking(move || scan_tree(&root))
        .await
        .map_err(|error| DeployError::publish(&destination, format!("scan task failed: {error}")))??;

    let mut summary = PublishSummary::default();

    for option_set in &target.file_options {
        let options = option_set.parse()?;
        for file in files.iter().filter(|file| options.filter.matches(&file.relative)) {
            let key = object_key(&target.prefix, &file.relative);
            store
                .upload_file(
                    &target.bucket,
                    &key,
                    &file.path,
                    &options.headers.for_file(&file.path),
                    &file.checksum,
                )
                .await
                .map_err(publish_error)?;
            summary.copied += 1;
        }
    }

    let remote: HashMap<String, u64> = store
        .list_objects(&target.bucket, &listing_prefix(&target.prefix))
        .await
        .map_err(publish_error)?
        .into_iter()
        .filter_map(|object| {
            relative_key(&target.prefix, &object.key).map(|relative| (relative.to_string(), object.size))
        })
        .collect();

    let default_headers = ObjectHeaders::default();
    for file in &files {
        let key = object_key(&target.prefix, &file.relative);
        if remote.get(&file.relative) == Some(&file.size) {
            let stored = store
                .object_checksum(&target.bucket, &key)
                .await
                .map_err(publish_error)?;
            if stored.as_deref() == Some(file.checksum.as_str()) {
                summary.unchanged += 1;
                continue;
            }
        }
        store
            .upload_file(
                &target.bucket,
                &key,
                &file.path,
                &default_headers.for_file(&file.path),
                &file.checksum,
            )
            .await
            .map_err(publish_error)?;
        summary.uploaded += 1;
    }

    if target.sync_mode == SyncMode::Mirror {
        let local: BTreeSet<&str> = files.iter().map(|file| file.relative.as_str()).collect();
        let stale: Vec<String> = remote
            .keys()
            .filter(|relative| !local.contains(relative.as_str()))
            .map(|relative| object_key(&target.prefix, relative))
            .collect();
        if !stale.is_empty() {
            store
                .delete_objects(&target.bucket, &stale)
                .await
                .map_err(publish_error)?;
        }
        summary.deleted = stale.len();
    }

    info!(
        component = "publish_sync",
        event = "publish_completed",
        destination = %destination,
        sync_mode = ?target.sync_mode,
        files = files.len(),
        copied = summary.copied,
        uploaded = summary.uploaded,
        unchanged = summary.unchanged,
        deleted = summary.deleted,
    );
    Ok(summary)
}

/// Deletes every object under `prefix` and returns how many were removed.
pub async fn remove_recursive(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<usize, AdapterError> {
    let keys: Vec<String> = store
        .list_objects(bucket, &listing_prefix(prefix))
        .await?
        .into_iter()
        .map(|object| object.key)
        .collect();
    if !keys.is_empty() {
        store.delete_objects(bucket, &keys).await?;
    }
    Ok(keys.len())
}

/// Deletes objects under the destination prefix whose keys are missing from
/// the newline-separated manifest.
pub async fn purge_unlisted(
    store: &dyn ObjectStore,
    target: &PublishTarget,
    manifest: &SourceArchive,
) -> Result<usize, DeployError> {
    let destination = s3_url(&target.bucket, &target.prefix);
    let body = store
        .read_object(&manifest.bucket_name, &manifest.object_key)
        .await
        .map_err(|error| DeployError::fetch(manifest.s3_url(), error))?;
    let listed: BTreeSet<&str> = std::str::from_utf8(&body)
        .map_err(|error| DeployError::fetch(manifest.s3_url(), format!("manifest is not UTF-8: {error}")))?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let unlisted: Vec<String> = store
        .list_objects(&target.bucket, &listing_prefix(&target.prefix))
        .await
        .map_err(|error| DeployError::publish(&destination, error))?
        .into_iter()
        .map(|object| object.key)
        .filter(|key| !listed.contains(key.as_str()))
        .collect();
    if !unlisted.is_empty() {
        store
            .delete_objects(&target.bucket, &unlisted)
            .await
            .map_err(|error| DeployError::publish(&destination, error))?;
    }

    info!(
        component = "publish_sync",
        event = "manifest_purge_completed",
        destination = %destination,
        manifest = %manifest.s3_url(),
        listed = listed.len(),
        deleted = unlisted.len(),
    );
    Ok(unlisted.len())
}

fn scan_tree(directory: &Path) -> Result<Vec<LocalFile>, DeployError> {
    let scan_error = |message: String| DeployError::publish(directory.display().to_string(), message);
    let mut files = Vec::new();

    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|error| scan_error(error.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(directory) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let body = std::fs::read(entry.path())
            .map_err(|error| scan_error(format!("failed to read {relative}: {error}")))?;

        files.push(LocalFile {
            relative,
            size: body.len() as u64,
            checksum: content_checksum(&body),
            path: entry.into_path(),
        });
    }

    Ok(files)
}
