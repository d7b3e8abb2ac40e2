use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use site_deploy_core::contract::ReplaceRule;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::DeployError;

/// Applies every rule, in order, to the files under `directory` matching its
/// glob, and returns how many distinct files were changed. Files whose
/// content is unchanged by a rule are not written.
pub fn apply(directory: &Path, rules: &[ReplaceRule]) -> Result<usize, DeployError> {
    if rules.is_empty() {
        return Ok(0);
    }

    let files = regular_files(directory)?;
    let mut modified = BTreeSet::new();

    for rule in rules {
        if rule.search.is_empty() {
            debug!(
                component = "template_rewriter",
                event = "rule_skipped",
                files = %rule.files,
                reason = "empty search string",
            );
            continue;
        }
        let pattern = RulePattern::compile(&rule.files)?;

        for (relative, path) in files.iter().filter(|(relative, _)| pattern.is_match(relative)) {
            let content =
                std::fs::read(path).map_err(|error| DeployError::rewrite(path.display(), error))?;
            let Some(rewritten) = replace_all(&content, rule.search.as_bytes(), rule.replace.as_bytes())
            else {
                continue;
            };
            if rewritten == content {
                continue;
            }
            std::fs::write(path, rewritten)
                .map_err(|error| DeployError::rewrite(path.display(), error))?;
            modified.insert(relative.clone());
        }
    }

    info!(
        component = "template_rewriter",
        event = "rewrite_completed",
        rules = rules.len(),
        modified_files = modified.len(),
    );
    Ok(modified.len())
}

/// File glob of one rule. `*` stops at `/` and `**` crosses directories.
/// Wildcards never match a name starting with `.`: such a path component
/// only matches a pattern segment that itself starts with `.`.
struct RulePattern {
    matcher: GlobMatcher,
    hidden_segments: Vec<GlobMatcher>,
}

impl RulePattern {
    fn compile(pattern: &str) -> Result<Self, DeployError> {
        let hidden_segments = pattern
            .split('/')
            .filter(|segment| segment.starts_with('.'))
            .map(|segment| compile(segment, pattern))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            matcher: compile(pattern, pattern)?,
            hidden_segments,
        })
    }

    fn is_match(&self, relative: &str) -> bool {
        self.matcher.is_match(relative)
            && relative
                .split('/')
                .filter(|component| component.starts_with('.'))
                .all(|component| {
                    self.hidden_segments
                        .iter()
                        .any(|segment| segment.is_match(component))
                })
    }
}

fn compile(glob: &str, pattern: &str) -> Result<GlobMatcher, DeployError> {
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|error| DeployError::rewrite(pattern, format!("invalid file pattern: {error}")))
}

/// Regular files under `directory` keyed by `/`-separated relative path.
/// Symlinks are not followed, so rules never reach outside the tree.
fn regular_files(directory: &Path) -> Result<Vec<(String, PathBuf)>, DeployError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(|error| DeployError::rewrite(directory.display(), error))?;
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
        files.push((relative, entry.into_path()));
    }
    Ok(files)
}

/// `None` when `needle` does not occur.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Option<Vec<u8>> {
    let mut output = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut found = false;

    while let Some(position) = rest.windows(needle.len()).position(|window| window == needle) {
        found = true;
        output.extend_from_slice(&rest[..position]);
        output.extend_from_slice(replacement);
        rest = &rest[position + needle.len()..];
    }

    if !found {
        return None;
    }
    output.extend_from_slice(rest);
    Some(output)
}
