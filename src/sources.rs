//! Locating and reading detector outputs.

use crate::codec::{Format, dataset, log};
use crate::detection::ImageDetectionSet;
use crate::error::{Error, Result};
use crate::report::Reporter;
use std::fs;
use std::path::{Path, PathBuf};

/// Log files under `dir`: `dir/*.txt` and `dir/<detector>/*.txt`, sorted by path
/// so the merge order does not depend on directory iteration order.
pub fn discover_logs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in read_dir_sorted(dir)? {
        if entry.is_dir() {
            found.extend(read_dir_sorted(&entry)?.into_iter().filter(|p| is_log(p)));
        } else if is_log(&entry) {
            found.push(entry);
        }
    }
    found.sort();
    Ok(found)
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn is_log(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|e| e == "txt")
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Read one detector log. A later line for an already-seen image replaces the earlier one.
pub fn read_log(path: &Path, reporter: &dyn Reporter) -> Result<ImageDetectionSet> {
    let text = read_text(path)?;
    let entries = log::decode(&text).map_err(|e| Error::decode(path, e))?;

    let mut set = ImageDetectionSet::new();
    for entry in entries {
        if set.insert(entry.image.clone(), entry.detections).is_some() {
            reporter.duplicate_image(path, &entry.image, entry.line);
        }
    }
    reporter.source_loaded(path, set.len(), set.detection_count());
    Ok(set)
}

/// Read a JSON dataset file.
pub fn read_dataset(path: &Path) -> Result<ImageDetectionSet> {
    let text = read_text(path)?;
    dataset::decode(&text).map_err(|e| Error::decode(path, e))
}

/// Read a file in whichever format its extension names.
pub fn read_any(path: &Path, reporter: &dyn Reporter) -> Result<(Format, ImageDetectionSet)> {
    let format = Format::from_path(path)?;
    let set = match format {
        Format::Log => read_log(path, reporter)?,
        Format::Dataset => read_dataset(path)?,
    };
    Ok((format, set))
}
