use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const WORKSPACE_PREFIX: &str = "site-deploy-";
const CONTENTS_DIR: &str = "contents";
const ARCHIVE_FILE: &str = "source.zip";

/// Private scratch directory for one source. The directory and everything
/// under it is removed when the value is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.path().join(ARCHIVE_FILE)
    }

    pub fn contents_dir(&self) -> PathBuf {
        self.dir.path().join(CONTENTS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_removed_on_drop() {
        let root = TempDir::new().expect("temp root");
        let workspace = Workspace::create(Some(root.path())).expect("workspace should be created");
        let path = workspace.path().to_path_buf();

        assert!(path.starts_with(root.path()));
        assert!(path.exists());
        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn layout_is_inside_workspace() {
        let workspace = Workspace::create(None).expect("workspace should be created");
        assert!(workspace.archive_path().starts_with(workspace.path()));
        assert!(workspace.contents_dir().starts_with(workspace.path()));
    }
}
