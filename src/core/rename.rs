//! Giving screenshots unique, time-ordered file names.

use chrono::{DateTime, Local};
use image::ImageFormat;
use serde::Serialize;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::core::operations::{list_files, move_file, unique_destination};
use crate::core::rebalance::MoveFailure;
use crate::errors::BalanceError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    pub renamed: usize,
    /// Files that already carried their target name
    pub unchanged: usize,
    pub failures: Vec<MoveFailure>,
}

impl RenameReport {
    pub fn absorb(&mut self, other: RenameReport) {
        self.renamed += other.renamed;
        self.unchanged += other.unchanged;
        self.failures.extend(other.failures);
    }
}

fn is_screenshot(path: &Path) -> bool {
    matches!(
        ImageFormat::from_path(path),
        Ok(ImageFormat::Png | ImageFormat::Jpeg)
    )
}

fn capture_time(path: &Path) -> io::Result<DateTime<Local>> {
    let metadata = fs::metadata(path)?;
    let time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(DateTime::<Local>::from(time))
}

/// Name a screenshot taken at `taken` would get at position `index`
pub fn screenshot_name(taken: &DateTime<Local>, index: usize, extension: &str) -> String {
    format!("screenshots_{}_{}.{}", taken.format("%Y%m%d_%H%M%S"), index, extension)
}

/// Rename every PNG/JPEG file directly inside `dir` to
/// `screenshots_<creation time>_<index>.<ext>`, indexing in sorted name order.
///
/// Other files are left alone. A rename never replaces an existing file; a
/// taken name gets the usual `_1`, `_2`, ... suffix.
pub fn rename_unique(dir: &Path) -> Result<RenameReport, BalanceError> {
    let mut report = RenameReport::default();

    let files = match list_files(dir) {
        Ok(files) => files,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{:?} does not exist, nothing to rename", dir);
            return Ok(report);
        }
        Err(source) => {
            return Err(BalanceError::PoolUnreadable {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let images: Vec<PathBuf> = files.into_iter().filter(|p| is_screenshot(p)).collect();
    info!("Renaming {} image(s) in {:?}", images.len(), dir);

    for (index, path) in images.iter().enumerate() {
        let taken = match capture_time(path) {
            Ok(taken) => taken,
            Err(e) => {
                error!("Cannot read timestamps of {:?}: {}", path, e);
                report.failures.push(MoveFailure {
                    source: path.clone(),
                    destination_dir: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = screenshot_name(&taken, index, &extension);
        if path.file_name().map_or(false, |current| current == name.as_str()) {
            report.unchanged += 1;
            continue;
        }

        let target = unique_destination(dir, OsStr::new(&name));
        debug!("{:?} -> {:?}", path, target);
        match move_file(path, &target) {
            Ok(()) => report.renamed += 1,
            Err(e) => {
                error!("Failed to rename {:?}: {}", path, e);
                report.failures.push(MoveFailure {
                    source: path.clone(),
                    destination_dir: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_screenshot_name_format() {
        let taken = Local.with_ymd_and_hms(2023, 4, 9, 21, 5, 3).unwrap();
        assert_eq!(
            screenshot_name(&taken, 12, "jpg"),
            "screenshots_20230409_210503_12.jpg"
        );
    }

    #[test]
    fn test_only_images_are_renamed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.jpg"), "b").unwrap();
        fs::write(temp.path().join("a.PNG"), "a").unwrap();
        fs::write(temp.path().join("notes.txt"), "n").unwrap();

        let report = rename_unique(temp.path()).unwrap();

        assert_eq!(report.renamed, 2);
        assert!(report.failures.is_empty());
        assert!(temp.path().join("notes.txt").exists());

        let names: Vec<String> = list_files(temp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 3);
        // sorted input: a.PNG gets index 0, b.jpg index 1
        assert!(names
            .iter()
            .any(|n| n.starts_with("screenshots_") && n.ends_with("_0.PNG")));
        assert!(names
            .iter()
            .any(|n| n.starts_with("screenshots_") && n.ends_with("_1.jpg")));
    }

    #[test]
    fn test_contents_survive_rename() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("shot.jpg"), "payload").unwrap();

        rename_unique(temp.path()).unwrap();

        let files = list_files(temp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "payload");
    }

    #[test]
    fn test_missing_dir_renames_nothing() {
        let temp = TempDir::new().unwrap();
        let report = rename_unique(&temp.path().join("absent")).unwrap();
        assert_eq!(report.renamed, 0);
    }

    #[test]
    fn test_absorb_sums_reports() {
        let mut total = RenameReport {
            renamed: 2,
            unchanged: 1,
            failures: Vec::new(),
        };
        total.absorb(RenameReport {
            renamed: 3,
            unchanged: 0,
            failures: vec![MoveFailure {
                source: PathBuf::from("x.jpg"),
                destination_dir: PathBuf::from("."),
                reason: "denied".to_string(),
            }],
        });
        assert_eq!(total.renamed, 5);
        assert_eq!(total.unchanged, 1);
        assert_eq!(total.failures.len(), 1);
    }
}
