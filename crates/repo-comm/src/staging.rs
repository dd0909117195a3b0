//! Local file helpers for check-in staging and out-of-band file delivery.

use crate::error::{CommError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Translate a `*`/`?`-style filename pattern into an anchored regex.
fn pattern_regex(pattern: &str) -> Result<Regex> {
    let mut translated = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => translated.push_str(".*"),
            '?' => translated.push('.'),
            _ => translated.push_str(&regex::escape(&ch.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated).map_err(|e| CommError::Validation {
        field: "pattern".to_string(),
        message: e.to_string(),
    })
}

/// Files directly inside `dir` whose names match any of `patterns`.
///
/// Matches are grouped in pattern order (headers before sources, say) and
/// sorted by name within each group; a file matching several patterns is
/// listed once, under the first.
pub fn scan_folder(dir: &Path, patterns: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CommError::NotADirectory(dir.to_path_buf()));
    }

    let mut entries: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    entries.sort();

    let mut matched = Vec::new();
    for pattern in patterns {
        let regex = pattern_regex(pattern)?;
        for path in &entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if regex.is_match(name) && !matched.contains(path) {
                matched.push(path.clone());
            }
        }
    }
    Ok(matched)
}

/// Copy `files` into `staging_dir`, creating it as needed. Same-named
/// files are overwritten. Returns the staged paths.
pub async fn stage_files(files: &[PathBuf], staging_dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(staging_dir).await?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name() else {
            return Err(CommError::Validation {
                field: "file".to_string(),
                message: format!("not a file path: {}", file.display()),
            });
        };
        let dest = staging_dir.join(name);
        tokio::fs::copy(file, &dest).await.map_err(|e| CommError::Io {
            message: format!("staging copy failed: {}", e),
            path: Some(file.clone()),
            source: Some(e),
        })?;
        staged.push(dest);
    }
    Ok(staged)
}

/// Read file text delivered out of band into the local save directory.
pub async fn read_saved_text(save_dir: &Path, filename: &str) -> Result<String> {
    let path = save_dir.join(filename);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommError::FileNotFound(path.clone()),
            _ => CommError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
                source: Some(e),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"content").unwrap();
    }

    #[test]
    fn test_scan_groups_by_pattern_then_name() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "zeta.h");
        touch(dir.path(), "alpha.h");
        touch(dir.path(), "main.cpp");
        touch(dir.path(), "notes.txt");

        let matches = scan_folder(dir.path(), &["*.h", "*.cpp"]).unwrap();
        let names: Vec<_> = matches
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alpha.h", "zeta.h", "main.cpp"]);
    }

    #[test]
    fn test_scan_does_not_match_longer_extensions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "widget.h");
        touch(dir.path(), "widget.hpp");

        let matches = scan_folder(dir.path(), &["*.h"]).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].ends_with("widget.h"));
    }

    #[test]
    fn test_scan_ignores_subdirectories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "top.h");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        touch(&dir.path().join("nested"), "deep.h");

        let matches = scan_folder(dir.path(), &["*.h"]).unwrap();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_scan_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(
            scan_folder(&missing, &["*.h"]),
            Err(CommError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_copies_into_fresh_dir() {
        let source = TempDir::new().unwrap();
        touch(source.path(), "a.h");
        touch(source.path(), "b.cpp");
        let staging = TempDir::new().unwrap();
        let staging_dir = staging.path().join("stage");

        let files = scan_folder(source.path(), &["*.h", "*.cpp"]).unwrap();
        let staged = stage_files(&files, &staging_dir).await.unwrap();

        assert_eq!(staged.len(), 2);
        for path in &staged {
            assert!(path.exists());
            assert!(path.starts_with(&staging_dir));
        }
    }

    #[tokio::test]
    async fn test_read_saved_text() {
        let save = TempDir::new().unwrap();
        std::fs::write(save.path().join("Logger.h"), "class Logger;").unwrap();

        let text = read_saved_text(save.path(), "Logger.h").await.unwrap();
        assert_eq!(text, "class Logger;");

        assert!(matches!(
            read_saved_text(save.path(), "Missing.h").await,
            Err(CommError::FileNotFound(_))
        ));
    }
}
