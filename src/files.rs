//! File-set enumeration.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::errors::{Error, Result};

/// Resolve the configured input to a common root directory and a sorted list
/// of file basenames.
///
/// Exactly one of `file_name` (a single path) or `files_regex` (a directory
/// joined with a regular expression over basenames) must be given.
pub(crate) fn enumerate(
    file_name: Option<&str>,
    files_regex: Option<&str>,
) -> Result<(PathBuf, Vec<String>)> {
    match (file_name, files_regex) {
        (Some(name), None) => single_file(name),
        (None, Some(pattern)) => matching_files(pattern),
        (Some(_), Some(_)) => Err(Error::EnumerationFailed {
            path: String::new(),
            detail: "file_name and files_regex are mutually exclusive".to_string(),
        }),
        (None, None) => Err(Error::EnumerationFailed {
            path: String::new(),
            detail: "neither file_name nor files_regex is set".to_string(),
        }),
    }
}

fn single_file(name: &str) -> Result<(PathBuf, Vec<String>)> {
    let path = Path::new(name);
    if !path.is_file() {
        return Err(Error::EnumerationFailed {
            path: name.to_string(),
            detail: "not a readable file".to_string(),
        });
    }
    let root = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::EnumerationFailed {
            path: name.to_string(),
            detail: "path has no file name".to_string(),
        })?;
    Ok((root, vec![base]))
}

fn matching_files(pattern: &str) -> Result<(PathBuf, Vec<String>)> {
    let full = Path::new(pattern);
    let dir = full.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let base_pattern = full
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::EnumerationFailed {
            path: pattern.to_string(),
            detail: "pattern has no basename component".to_string(),
        })?;

    let re = Regex::new(&base_pattern).map_err(|e| Error::EnumerationFailed {
        path: pattern.to_string(),
        detail: format!("invalid regex: {e}"),
    })?;

    let entries = std::fs::read_dir(&dir).map_err(|e| Error::EnumerationFailed {
        path: dir.to_string_lossy().into_owned(),
        detail: e.to_string(),
    })?;

    let mut files: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| re.is_match(name))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Error::EnumerationFailed {
            path: pattern.to_string(),
            detail: "no files match".to_string(),
        });
    }
    Ok((dir, files))
}
