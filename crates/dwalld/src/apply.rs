use log::{debug, error, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::images::ImageStore;
use crate::resolve::Selection;
use crate::sink::WallpaperSink;
use crate::state::AppliedState;

/// Applies a resolved selection to the system wallpaper. Idempotent: a
/// selection equal to the recorded one is a no-op, so overlapping triggers
/// for the same image cost nothing. The actual OS write runs on a background
/// thread and never blocks the caller.
pub struct Applier {
    images: ImageStore,
    state: Arc<AppliedState>,
    sink: Arc<dyn WallpaperSink>,
}

impl Applier {
    pub fn new(images: ImageStore, state: Arc<AppliedState>, sink: Arc<dyn WallpaperSink>) -> Self {
        Self {
            images,
            state,
            sink,
        }
    }

    /// Fire-and-forget. Returns the worker handle when a write was started
    /// (callers normally drop it; tests join it). On failure the recorded
    /// state is left stale so the next trigger retries.
    pub fn apply(&self, selection: Selection) -> Option<JoinHandle<()>> {
        let target = selection.image_name().to_string();

        if self.state.current().as_deref() == Some(target.as_str()) {
            debug!("wallpaper {target} already applied, skipping");
            return None;
        }

        let path = self.images.path(&target);
        if !path.is_file() {
            // Stale alarms and deleted rules can still name this image.
            warn!("no stored image named {target}, skipping apply");
            return None;
        }

        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);
        Some(thread::spawn(move || match sink.set_wallpaper(&path) {
            Ok(()) => {
                if let Err(err) = state.set_current(&target) {
                    error!("wallpaper set but state not recorded: {err:#}");
                } else {
                    info!("wallpaper set: {target}");
                }
            }
            Err(err) => {
                error!("failed to set wallpaper {target}: {err:#}");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    struct RecordingSink {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl WallpaperSink for RecordingSink {
        fn set_wallpaper(&self, image: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(image.to_path_buf());
            Ok(())
        }
    }

    struct FailingSink;

    impl WallpaperSink for FailingSink {
        fn set_wallpaper(&self, _image: &Path) -> Result<()> {
            Err(anyhow::anyhow!("simulated OS failure"))
        }
    }

    fn applier_with_sink(
        dir: &Path,
        sink: Arc<dyn WallpaperSink>,
    ) -> (Applier, Arc<AppliedState>) {
        let images = ImageStore::new(dir.join("wallpapers"));
        let state = Arc::new(AppliedState::new(dir.join("applied.json")));
        (
            Applier::new(images, Arc::clone(&state), sink),
            state,
        )
    }

    fn stash_image(dir: &Path, name: &str) {
        let root = dir.join("wallpapers");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(name), b"bytes").unwrap();
    }

    #[test]
    fn applying_the_same_selection_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let (applier, state) = applier_with_sink(dir.path(), sink.clone());
        stash_image(dir.path(), "img-1");

        let selection = Selection::Image("img-1".to_string());
        applier.apply(selection.clone()).unwrap().join().unwrap();
        assert_eq!(state.current(), Some("img-1".to_string()));

        // Second apply is decided before any thread is spawned.
        assert!(applier.apply(selection).is_none());
        assert_eq!(sink.call_count(), 1);
    }

    #[test]
    fn default_selection_uses_the_reserved_image() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let (applier, state) = applier_with_sink(dir.path(), sink.clone());
        stash_image(dir.path(), "default");

        applier.apply(Selection::Default).unwrap().join().unwrap();
        assert_eq!(state.current(), Some("default".to_string()));
        assert_eq!(sink.call_count(), 1);
    }

    #[test]
    fn unknown_image_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::new();
        let (applier, state) = applier_with_sink(dir.path(), sink.clone());

        assert!(applier
            .apply(Selection::Image("deleted".to_string()))
            .is_none());
        assert_eq!(sink.call_count(), 0);
        assert_eq!(state.current(), None);
    }

    #[test]
    fn sink_failure_leaves_state_stale_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (applier, state) = applier_with_sink(dir.path(), Arc::new(FailingSink));
        stash_image(dir.path(), "img-1");

        applier
            .apply(Selection::Image("img-1".to_string()))
            .unwrap()
            .join()
            .unwrap();

        // Not recorded, so a later trigger retries the write.
        assert_eq!(state.current(), None);
    }
}
