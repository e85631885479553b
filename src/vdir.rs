//! The vCard directory on disk.
//!
//! Every `*.vcf` file below the root is a card. Files directly under the
//! root belong to the `default` address book; files inside a subdirectory
//! belong to the book named after that top-level subdirectory.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use sha1::{Digest, Sha1};

pub const DEFAULT_BOOK: &str = "default";

pub fn list_vcf_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_vcf(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_vcf(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            collect_vcf(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("vcf"))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

// dot entries hold sync metadata (.git, vdirsyncer status, editor swap files)
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Address book a card file belongs to.
pub fn book_name(root: &Path, path: &Path) -> String {
    let Ok(relative) = path.strip_prefix(root) else {
        return DEFAULT_BOOK.to_string();
    };
    let components: Vec<Component<'_>> = relative.components().collect();
    match components.as_slice() {
        [Component::Normal(book), _, ..] => book.to_string_lossy().into_owned(),
        _ => DEFAULT_BOOK.to_string(),
    }
}

pub struct FileState {
    pub sha1: Vec<u8>,
    pub mtime: i64,
}

pub fn compute_file_state(path: &Path) -> Result<FileState> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to read metadata for {}", path.display()))?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let mtime = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let data = fs::read(path).with_context(|| format!("failed to read file {}", path.display()))?;
    let mut hasher = Sha1::new();
    hasher.update(&data);
    let sha1 = hasher.finalize().to_vec();

    Ok(FileState { sha1, mtime })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lists_vcf_files_recursively() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("work")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("a.vcf"), "").unwrap();
        fs::write(root.join("B.VCF"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();
        fs::write(root.join("work/c.vcf"), "").unwrap();
        fs::write(root.join(".git/d.vcf"), "").unwrap();

        let files = list_vcf_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["B.VCF", "a.vcf", "work/c.vcf"]);
    }

    #[test]
    fn test_book_name() {
        let root = Path::new("/contacts");
        assert_eq!(book_name(root, Path::new("/contacts/a.vcf")), "default");
        assert_eq!(book_name(root, Path::new("/contacts/work/a.vcf")), "work");
        assert_eq!(book_name(root, Path::new("/contacts/work/old/a.vcf")), "work");
        assert_eq!(book_name(root, Path::new("/elsewhere/a.vcf")), "default");
    }

    #[test]
    fn test_file_state_tracks_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.vcf");
        fs::write(&path, "one").unwrap();
        let first = compute_file_state(&path).unwrap();
        fs::write(&path, "two").unwrap();
        let second = compute_file_state(&path).unwrap();
        assert_eq!(first.sha1.len(), 20);
        assert_ne!(first.sha1, second.sha1);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(list_vcf_files(&dir.path().join("missing")).is_err());
    }
}
