use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

/// Result type for file operations
pub type FileOpResult<T> = Result<T, FileOpError>;

/// Why a single file could not be moved. The source file is still in place
/// whenever one of these is returned.
#[derive(Error, Debug)]
pub enum FileOpError {
    #[error("{path:?} has no file name")]
    NoFileName { path: PathBuf },

    #[error("failed to move {src:?} to {dest:?}: {source}")]
    MoveFailed {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("copied {src:?} to {dest:?} but could not remove the original: {source}")]
    RemoveFailed {
        src: PathBuf,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn is_free(path: &Path) -> bool {
    // symlink_metadata so a dangling link still counts as taken
    fs::symlink_metadata(path).is_err()
}

/// Pick a path for `file_name` inside `dest_dir` that nothing occupies yet.
///
/// `a.jpg` is tried first, then `a_1.jpg`, `a_2.jpg`, ... Names without an
/// extension get the suffix at the end (`notes_1`).
pub fn unique_destination(dest_dir: &Path, file_name: &OsStr) -> PathBuf {
    let candidate = dest_dir.join(file_name);
    if is_free(&candidate) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    let mut counter = 1usize;
    loop {
        let renamed = match &extension {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        };
        let candidate = dest_dir.join(renamed);
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Move one file. A plain rename is tried first; when that fails (for
/// example across filesystems) the file is copied and the original removed.
/// Either the file ends up at `dest` and is gone from `src`, or `src` is left
/// untouched and no copy remains at `dest`.
pub fn move_file(src: &Path, dest: &Path) -> FileOpResult<()> {
    debug!("Moving file from {:?} to {:?}", src, dest);

    match fs::rename(src, dest) {
        Ok(()) => return Ok(()),
        Err(e) if !src.exists() => {
            return Err(FileOpError::MoveFailed {
                src: src.to_path_buf(),
                dest: dest.to_path_buf(),
                source: e,
            });
        }
        Err(e) => debug!("Rename failed ({}), falling back to copy + remove", e),
    }

    copy_then_remove(src, dest)
}

/// Copy `src` to `dest`, then remove `src`. On any failure the copy at
/// `dest` is deleted again and `src` stays in place.
fn copy_then_remove(src: &Path, dest: &Path) -> FileOpResult<()> {
    if let Err(e) = fs::copy(src, dest) {
        error!("Failed to copy file from {:?} to {:?}: {}", src, dest, e);
        // fs::copy may leave a partial file behind
        let _ = fs::remove_file(dest);
        return Err(FileOpError::MoveFailed {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = fs::remove_file(src) {
        error!("Failed to remove original file {:?} after copy: {}", src, e);
        let _ = fs::remove_file(dest);
        return Err(FileOpError::RemoveFailed {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}

/// Move `src` into `dest_dir` under a collision-free name and return where it
/// landed. `dest_dir` must already exist.
pub fn relocate_into(src: &Path, dest_dir: &Path) -> FileOpResult<PathBuf> {
    let file_name = src.file_name().ok_or_else(|| FileOpError::NoFileName {
        path: src.to_path_buf(),
    })?;
    let dest = unique_destination(dest_dir, file_name);
    move_file(src, &dest)?;
    Ok(dest)
}

/// Regular files directly inside `dir`, sorted by path.
///
/// Subdirectories are not descended into. A missing directory surfaces as an
/// `io::ErrorKind::NotFound` error so callers can tell it apart from an empty one.
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_unique_destination_without_collision() {
        let temp = TempDir::new().unwrap();
        let dest = unique_destination(temp.path(), &OsString::from("a.jpg"));
        assert_eq!(dest, temp.path().join("a.jpg"));
    }

    #[test]
    fn test_unique_destination_suffixes_until_free() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg", "1");
        assert_eq!(
            unique_destination(temp.path(), &OsString::from("a.jpg")),
            temp.path().join("a_1.jpg")
        );

        touch(temp.path(), "a_1.jpg", "2");
        assert_eq!(
            unique_destination(temp.path(), &OsString::from("a.jpg")),
            temp.path().join("a_2.jpg")
        );
    }

    #[test]
    fn test_unique_destination_without_extension() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "notes", "x");
        assert_eq!(
            unique_destination(temp.path(), &OsString::from("notes")),
            temp.path().join("notes_1")
        );
    }

    #[test]
    fn test_move_file_moves_content() {
        let temp = TempDir::new().unwrap();
        let src = touch(temp.path(), "src.png", "pixels");
        let dest = temp.path().join("dest.png");

        move_file(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "pixels");
    }

    #[test]
    fn test_move_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let result = move_file(&temp.path().join("gone.jpg"), &temp.path().join("x.jpg"));
        assert!(matches!(result, Err(FileOpError::MoveFailed { .. })));
        assert!(!temp.path().join("x.jpg").exists());
    }

    #[test]
    fn test_copy_then_remove_moves_content() {
        let temp = TempDir::new().unwrap();
        let src = touch(temp.path(), "src.png", "pixels");
        let dest = temp.path().join("dest.png");

        copy_then_remove(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "pixels");
    }

    #[test]
    fn test_failed_fallback_leaves_source_in_place() {
        let temp = TempDir::new().unwrap();
        let src = touch(temp.path(), "src.png", "pixels");
        // rename fails while src still exists, so the copy fallback runs and fails too
        let dest = temp.path().join("no_such_dir").join("dest.png");

        let result = move_file(&src, &dest);

        assert!(matches!(result, Err(FileOpError::MoveFailed { .. })));
        assert_eq!(fs::read_to_string(&src).unwrap(), "pixels");
        assert!(!dest.exists());
    }

    #[test]
    fn test_relocate_into_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let src_dir = temp.path().join("train");
        let dest_dir = temp.path().join("val");
        fs::create_dir_all(&src_dir).unwrap();
        fs::create_dir_all(&dest_dir).unwrap();
        let src = touch(&src_dir, "a.jpg", "incoming");
        touch(&dest_dir, "a.jpg", "resident");

        let landed = relocate_into(&src, &dest_dir).unwrap();

        assert_eq!(landed, dest_dir.join("a_1.jpg"));
        assert_eq!(fs::read_to_string(dest_dir.join("a.jpg")).unwrap(), "resident");
        assert_eq!(fs::read_to_string(&landed).unwrap(), "incoming");
        assert!(!src.exists());
    }

    #[test]
    fn test_list_files_is_sorted_and_flat() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "b.jpg", "");
        touch(temp.path(), "a.jpg", "");
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        touch(&temp.path().join("nested"), "c.jpg", "");

        let files = list_files(temp.path()).unwrap();
        assert_eq!(files, vec![temp.path().join("a.jpg"), temp.path().join("b.jpg")]);
    }

    #[test]
    fn test_list_files_missing_dir_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = list_files(&temp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
