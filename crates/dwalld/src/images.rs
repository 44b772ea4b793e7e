use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// Thumbnail size shown by list frontends.
const THUMB_WIDTH: u32 = 108;
const THUMB_HEIGHT: u32 = 192;

/// Flat directory of stored wallpaper images. Each image is saved under an
/// opaque name (epoch millis at save time) together with a `<name>_th` JPEG
/// thumbnail.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Stores the image bytes under a fresh name and returns that name.
    pub fn save(&self, bytes: &[u8]) -> Result<String> {
        let name = chrono::Utc::now().timestamp_millis().to_string();
        self.save_as(&name, bytes)?;
        Ok(name)
    }

    /// Stores the image bytes under a caller-chosen name (used for the
    /// reserved `default` image), overwriting any previous content.
    pub fn save_as(&self, name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create image directory: {}", self.root.display()))?;

        let path = self.path(name);
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write image: {}", path.display()))?;
        self.write_thumbnail(name, bytes)?;
        Ok(())
    }

    fn write_thumbnail(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let decoded = image::load_from_memory(bytes).context("failed to decode image")?;
        // JPEG has no alpha channel.
        let thumb = decoded.thumbnail(THUMB_WIDTH, THUMB_HEIGHT).into_rgb8();
        let path = self.thumbnail_path(name);
        thumb
            .save_with_format(&path, image::ImageFormat::Jpeg)
            .with_context(|| format!("failed to write thumbnail: {}", path.display()))?;
        Ok(())
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn thumbnail_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}_th"))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Removes the image and its thumbnail. True only when both existed.
    pub fn delete(&self, name: &str) -> bool {
        let image_gone = remove_if_present(&self.path(name));
        let thumb_gone = remove_if_present(&self.thumbnail_path(name));
        image_gone && thumb_gone
    }
}

fn remove_if_present(path: &Path) -> bool {
    std::fs::remove_file(path).is_ok()
}
