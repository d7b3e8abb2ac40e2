use std::fs::File;
use std::path::{Path, PathBuf};

use site_deploy_core::contract::SourceArchive;
use tracing::info;
use zip::ZipArchive;

use crate::adapters::object_store::ObjectStore;
use crate::error::DeployError;
use crate::pipeline::workspace::Workspace;

/// Downloads the source archive into the workspace and extracts it into a
/// fresh `contents` directory, which is returned.
pub async fn fetch_and_extract(
    store: &dyn ObjectStore,
    source: &SourceArchive,
    workspace: &Workspace,
) -> Result<PathBuf, DeployError> {
    let source_url = source.s3_url();
    let archive_path = workspace.archive_path();
    let contents_dir = workspace.contents_dir();

    store
        .download_to_file(&source.bucket_name, &source.object_key, &archive_path)
        .await
        .map_err(|error| DeployError::fetch(&source_url, error))?;

    let target = contents_dir.clone();
    let file_count = tokio::task::spawn_blocking(move || extract_archive(&archive_path, &target))
        .await
        .map_err(|error| DeployError::fetch(&source_url, format!("extraction task failed: {error}")))?
        .map_err(|message| DeployError::fetch(&source_url, message))?;

    info!(
        component = "archive_fetcher",
        event = "archive_extracted",
        source = %source_url,
        entries = file_count,
        contents_dir = %contents_dir.display(),
    );
    Ok(contents_dir)
}

fn extract_archive(archive_path: &Path, target: &Path) -> Result<usize, String> {
    std::fs::create_dir_all(target)
        .map_err(|error| format!("failed to create {}: {error}", target.display()))?;
    let file = File::open(archive_path)
        .map_err(|error| format!("failed to open downloaded archive: {error}"))?;
    let mut archive =
        ZipArchive::new(file).map_err(|error| format!("corrupt archive: {error}"))?;
    let entries = archive.len();
    archive
        .extract(target)
        .map_err(|error| format!("failed to extract archive: {error}"))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{zip_archive, MemoryObjectStore};

    fn source() -> SourceArchive {
        SourceArchive {
            bucket_name: "assets".to_string(),
            object_key: "site.zip".to_string(),
        }
    }

    #[tokio::test]
    async fn extracts_nested_entries() {
        let store = MemoryObjectStore::new();
        store.seed(
            "assets",
            "site.zip",
            &zip_archive(&[("index.html", "<h1>hi</h1>"), ("css/app.css", "body{}")]),
        );
        let workspace = Workspace::create(None).expect("workspace");

        let contents = fetch_and_extract(&store, &source(), &workspace)
            .await
            .expect("archive should extract");

        assert_eq!(
            std::fs::read_to_string(contents.join("index.html")).expect("index"),
            "<h1>hi</h1>"
        );
        assert_eq!(
            std::fs::read_to_string(contents.join("css/app.css")).expect("css"),
            "body{}"
        );
    }

    #[tokio::test]
    async fn missing_object_is_fetch_error() {
        let store = MemoryObjectStore::new();
        let workspace = Workspace::create(None).expect("workspace");

        let error = fetch_and_extract(&store, &source(), &workspace)
            .await
            .expect_err("missing archive should fail");

        assert!(matches!(error, DeployError::Fetch { .. }));
        assert!(error.to_string().contains("s3://assets/site.zip"));
    }

    #[tokio::test]
    async fn corrupt_archive_is_fetch_error() {
        let store = MemoryObjectStore::new();
        store.seed("assets", "site.zip", b"definitely not a zip");
        let workspace = Workspace::create(None).expect("workspace");

        let error = fetch_and_extract(&store, &source(), &workspace)
            .await
            .expect_err("corrupt archive should fail");

        assert!(error.to_string().contains("corrupt archive"));
    }

    #[tokio::test]
    async fn download_failure_is_fetch_error() {
        let store = MemoryObjectStore::new();
        store.fail_downloads("throttled");
        let workspace = Workspace::create(None).expect("workspace");

        let error = fetch_and_extract(&store, &source(), &workspace)
            .await
            .expect_err("download failure should fail");
        assert!(error.to_string().contains("throttled"));
    }
}
