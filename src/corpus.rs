//! Facilities for discovering input files and loading text corpora.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{BpeError, Result};

/// Discovers files rooted at the provided input paths according to the ingest configuration.
///
/// Directories are traversed recursively by default; set [`IngestConfig::recursive`] to `false`
/// to limit discovery to the first level.  Entries within a directory are visited in file name
/// order so the resulting corpus, and therefore training, is reproducible.
pub fn collect_paths<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if !path.exists() {
            return Err(BpeError::InvalidConfig(format!(
                "input path {path:?} does not exist"
            )));
        }
        let metadata = path
            .metadata()
            .map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
        if metadata.is_dir() {
            if cfg.recursive {
                let walker = WalkDir::new(path)
                    .follow_links(cfg.follow_symlinks)
                    .sort_by_file_name();
                for entry in walker {
                    let entry = entry.map_err(|err| BpeError::Internal(err.to_string()))?;
                    if entry.file_type().is_file() {
                        files.push(entry.path().to_path_buf());
                    }
                }
            } else {
                let mut level = Vec::new();
                for entry in
                    fs::read_dir(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?
                {
                    let entry =
                        entry.map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
                    let entry_path = entry.path();
                    if entry_path.is_file() {
                        level.push(entry_path);
                    }
                }
                level.sort();
                files.extend(level);
            }
        } else if metadata.is_file() {
            files.push(path.to_path_buf());
        }
    }
    if files.is_empty() {
        return Err(BpeError::InvalidConfig(
            "no files discovered in provided inputs".into(),
        ));
    }
    Ok(files)
}

/// Loads UTF-8 text files into training texts.
///
/// Each file becomes one text, or one text per line when [`IngestConfig::split_lines`] is set.
/// Empty texts are discarded.
pub fn load_text_corpus<P: AsRef<Path>>(inputs: &[P], cfg: &IngestConfig) -> Result<Vec<String>> {
    let file_paths = collect_paths(inputs, cfg)?;
    let mut texts = Vec::new();
    for file_path in file_paths {
        let contents = fs::read_to_string(&file_path)
            .map_err(|err| BpeError::io(err, Some(file_path.clone())))?;
        if cfg.split_lines {
            texts.extend(
                contents
                    .lines()
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );
        } else if !contents.is_empty() {
            texts.push(contents);
        }
    }
    if texts.is_empty() {
        return Err(BpeError::InvalidConfig(
            "no text could be loaded from inputs".into(),
        ));
    }
    Ok(texts)
}
