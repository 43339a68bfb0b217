use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use image::{DynamicImage, ImageFormat};

/// Keeps a JPEG copy of every uploaded image under one directory.
///
/// Files are named after the local wall-clock second they were stored in, so
/// two uploads within the same second overwrite each other.
#[derive(Debug, Clone)]
pub struct UploadArchive {
    dir: PathBuf,
}

impl UploadArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create upload directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.dir
            .join(format!("image_{}.jpg", timestamp.format("%Y%m%d_%H%M%S")))
    }

    pub fn store(&self, image: &DynamicImage) -> Result<PathBuf> {
        self.store_at(image, Local::now().naive_local())
    }

    pub fn store_at(&self, image: &DynamicImage, timestamp: NaiveDateTime) -> Result<PathBuf> {
        // The directory may have been removed while the server was running.
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create upload directory {}", self.dir.display()))?;
        let path = self.path_for(timestamp);
        // JPEG has no alpha channel.
        DynamicImage::ImageRgb8(image.to_rgb8())
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write upload {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use image::RgbaImage;

    fn timestamp(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, second)
            .unwrap()
    }

    #[test]
    fn file_name_follows_timestamp_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let archive = UploadArchive::new(dir.path()).unwrap();
        assert_eq!(
            archive.path_for(timestamp(7)),
            dir.path().join("image_20240309_140507.jpg")
        );
    }

    #[test]
    fn stored_image_keeps_its_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let archive = UploadArchive::new(dir.path().join("uploads")).unwrap();
        let image = DynamicImage::ImageRgba8(RgbaImage::new(31, 17));

        let path = archive.store(&image).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("image_") && name.ends_with(".jpg"), "{name}");
        assert_eq!(name.len(), "image_YYYYMMDD_HHMMSS.jpg".len());
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (31, 17));
    }

    #[test]
    fn directory_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        UploadArchive::new(dir.path().join("uploads")).unwrap();
        let archive = UploadArchive::new(dir.path().join("uploads")).unwrap();
        assert!(archive.dir().is_dir());
    }

    #[test]
    fn vanished_directory_is_recreated() {
        let dir = tempfile::tempdir().unwrap();
        let archive = UploadArchive::new(dir.path().join("uploads")).unwrap();
        std::fs::remove_dir(archive.dir()).unwrap();

        let path = archive.store_at(&DynamicImage::new_rgb8(2, 2), timestamp(1)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn same_second_uploads_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let archive = UploadArchive::new(dir.path()).unwrap();
        archive.store_at(&DynamicImage::new_rgb8(4, 4), timestamp(9)).unwrap();
        let path = archive.store_at(&DynamicImage::new_rgb8(8, 6), timestamp(9)).unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (8, 6));
    }
}
