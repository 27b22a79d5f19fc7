//! Recursive glob matching over a workspace tree.
//!
//! Patterns use shell glob syntax. A pattern without a path separator is
//! matched against the file name only, so `*.xml` finds `junit.xml` at any
//! depth; a pattern with a separator is matched against the path relative to
//! the walk root.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern, PatternError};
use ignore::WalkBuilder;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlobTreeError {
    #[error("invalid artifact pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: PatternError,
    },
}

struct CompiledPattern {
    pattern: Pattern,
    anchored: bool,
}

impl CompiledPattern {
    fn compile(raw: &str) -> Result<Self, GlobTreeError> {
        let pattern = Pattern::new(raw).map_err(|source| GlobTreeError::InvalidPattern {
            pattern: raw.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            anchored: raw.contains('/'),
        })
    }

    fn is_match(&self, file_name: &str, relative: &str) -> bool {
        if self.anchored {
            self.pattern.matches_with(
                relative,
                MatchOptions {
                    case_sensitive: true,
                    require_literal_separator: true,
                    require_literal_leading_dot: false,
                },
            )
        } else {
            self.pattern.matches(file_name)
        }
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<CompiledPattern>, GlobTreeError> {
    patterns.iter().map(|p| CompiledPattern::compile(p)).collect()
}

/// Check that every pattern compiles, without walking anything.
pub fn validate_patterns(patterns: &[String]) -> Result<(), GlobTreeError> {
    compile_all(patterns).map(|_| ())
}

/// Walk `root` and return every regular file matching at least one pattern.
///
/// All patterns are compiled before the walk starts, so a malformed pattern
/// fails the call without touching the filesystem. Each file appears once,
/// and the result is sorted.
pub fn glob_tree(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, GlobTreeError> {
    let compiled = compile_all(patterns)?;

    if compiled.is_empty() {
        return Ok(Vec::new());
    }

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    let mut matches = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");

        if compiled.iter().any(|p| p.is_match(&file_name, &relative)) {
            matches.push(path.to_path_buf());
        }
    }

    matches.sort();
    matches.dedup();
    Ok(matches)
}
