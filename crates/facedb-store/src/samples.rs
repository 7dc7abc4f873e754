//! Face crop files referenced by samples.

use crate::error::StoreError;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// The directory holding sample images.
///
/// Deletion is best effort: the record table is authoritative, so a crop
/// that is already gone, or cannot be removed, is logged and skipped.
#[derive(Debug, Clone)]
pub struct SampleImages {
    dir: PathBuf,
}

impl SampleImages {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a face crop as JPEG and return its path.
    pub fn save(&self, image: &DynamicImage, timestamp: i64) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let name = format!("{timestamp}_{}.jpg", uuid::Uuid::new_v4().simple());
        let path = self.dir.join(name);
        image.to_rgb8().save(&path)?;
        tracing::debug!(path = %path.display(), "saved sample image");
        Ok(path)
    }

    /// Copy an existing crop (any format the `image` crate reads) into the
    /// samples directory.
    pub fn import(&self, source: &Path, timestamp: i64) -> Result<PathBuf, StoreError> {
        let image = image::open(source)?;
        self.save(&image, timestamp)
    }

    /// Delete one crop, ignoring a file that is already gone.
    pub fn remove(&self, path: &Path) {
        if path.as_os_str().is_empty() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "removed sample image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove sample image")
            }
        }
    }

    /// Delete every regular file directly under the samples directory.
    /// Returns how many were removed.
    pub fn clear(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "cannot list samples directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove sample image")
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let images = SampleImages::new(dir.path().join("samples"));
        let crop = DynamicImage::new_rgb8(8, 8);

        let path = images.save(&crop, 1000).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(images.dir()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("1000_"));

        images.remove(&path);
        assert!(!path.exists());
        // Second removal is a silent no-op.
        images.remove(&path);
    }

    #[test]
    fn test_import_reencodes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("crop.png");
        DynamicImage::new_rgba8(4, 4).save(&source).unwrap();

        let images = SampleImages::new(dir.path().join("samples"));
        let path = images.import(&source, 7).unwrap();
        assert_eq!(path.extension().unwrap(), "jpg");
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_clear_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let images = SampleImages::new(dir.path());
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"y").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(images.clear(), 2);
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn test_clear_missing_dir() {
        let images = SampleImages::new("/nonexistent/facedb/samples");
        assert_eq!(images.clear(), 0);
    }
}
