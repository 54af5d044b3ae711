use std::fs;
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use tempfile::Builder;
use zip::ZipArchive;

use crate::error::IndexError;

fn fs_err(err: impl std::fmt::Display) -> IndexError {
    IndexError::Filesystem(err.to_string())
}

/// Unpacks `zip_path` into `target_dir`. An existing target directory is
/// removed first so stale files from an older archive never survive.
pub fn extract_zip_fresh(zip_path: &Path, target_dir: &Path) -> Result<(), IndexError> {
    if target_dir.exists() {
        fs::remove_dir_all(target_dir).map_err(fs_err)?;
    }
    fs::create_dir_all(target_dir).map_err(fs_err)?;

    let file = fs::File::open(zip_path)
        .map_err(|err| IndexError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(fs_err)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(fs_err)?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(IndexError::Filesystem(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(fs_err)?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(fs_err)?;
        }
        let mut outfile = fs::File::create(&entry_path).map_err(fs_err)?;
        io::copy(&mut entry, &mut outfile).map_err(fs_err)?;
    }
    Ok(())
}

/// Decompresses a gzip file into `target`.
pub fn gunzip(source: &Utf8Path, target: &Utf8Path) -> Result<(), IndexError> {
    let file = fs::File::open(source.as_std_path())
        .map_err(|err| IndexError::Filesystem(format!("open {source}: {err}")))?;
    let mut decoder = GzDecoder::new(file);
    let parent = target
        .parent()
        .ok_or_else(|| IndexError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path()).map_err(fs_err)?;
    let mut temp = Builder::new()
        .prefix("ontology-index-gunzip")
        .tempfile_in(parent.as_std_path())
        .map_err(fs_err)?;
    io::copy(&mut decoder, &mut temp)
        .map_err(|err| IndexError::Filesystem(format!("gunzip {source}: {err}")))?;
    temp.persist(target.as_std_path()).map_err(fs_err)?;
    Ok(())
}

/// Writes through a temp file in the same directory and renames it into
/// place, replacing any previous file.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), IndexError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(fs_err)?;
    let mut temp = Builder::new()
        .prefix(".ontology-index")
        .tempfile_in(parent.as_std_path())
        .map_err(fs_err)?;
    temp.write_all(content).map_err(fs_err)?;
    temp.flush().map_err(fs_err)?;
    temp.persist(path.as_std_path()).map_err(fs_err)?;
    Ok(())
}

/// All files below `root` with the given extension, sorted by path.
pub fn list_files_with_extension(root: &Path, extension: &str) -> Result<Vec<PathBuf>, IndexError> {
    let mut files: Vec<PathBuf> = walk_dir(root)?
        .into_iter()
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(extension))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Last modification time as `YYYY-MM-DD` (UTC).
pub fn modified_date(path: &Path) -> Result<String, IndexError> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(fs_err)?;
    let stamp: DateTime<Utc> = modified.into();
    Ok(stamp.format("%Y-%m-%d").to_string())
}

fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(fs_err)?;
        for entry in entries {
            let entry = entry.map_err(fs_err)?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path.clone());
            }
            items.push(path);
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    fn utf8(path: PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    #[test]
    fn atomic_write_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = utf8(dir.path().join("out").join("index.csv"));
        write_bytes_atomic(&path, b"first").unwrap();
        write_bytes_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "second");
    }

    #[test]
    fn gunzip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = utf8(dir.path().join("dump.n3.gz"));
        let target = utf8(dir.path().join("dump.n3"));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<http://a> <http://b> <http://c> .").unwrap();
        fs::write(source.as_std_path(), encoder.finish().unwrap()).unwrap();

        gunzip(&source, &target).unwrap();
        let mut text = String::new();
        fs::File::open(target.as_std_path())
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "<http://a> <http://b> <http://c> .");
    }

    #[test]
    fn lists_files_sorted_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        fs::write(dir.path().join("src/sub/b.ttl"), "").unwrap();
        fs::write(dir.path().join("src/a.ttl"), "").unwrap();
        fs::write(dir.path().join("src/readme.md"), "").unwrap();

        let files = list_files_with_extension(&dir.path().join("src"), "ttl").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.ttl", "b.ttl"]);
    }

    #[test]
    fn modified_date_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ttl");
        fs::write(&path, "").unwrap();
        let date = modified_date(&path).unwrap();
        assert!(crate::text::is_iso_date(&date));
        assert_eq!(date.len(), 10);
    }
}
