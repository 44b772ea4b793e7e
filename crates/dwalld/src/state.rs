use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppliedRecord {
    current: Option<String>,
}

/// Durable record of the image last written to the system wallpaper
/// (`"default"` for the fallback). Read before every apply decision, written
/// only after a successful apply, survives restarts.
pub struct AppliedState {
    path: PathBuf,
}

impl AppliedState {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `None` until the first successful apply, or when the record is
    /// unreadable (treated as "unknown", so the next apply goes through).
    pub fn current(&self) -> Option<String> {
        let text = std::fs::read_to_string(&self.path).ok()?;
        let record: AppliedRecord = serde_json::from_str(&text).ok()?;
        record.current
    }

    pub fn set_current(&self, image: &str) -> Result<()> {
        self.write(AppliedRecord {
            current: Some(image.to_string()),
        })
    }

    /// Forgets the recorded image, so the next apply of the same name goes
    /// through. Used when stored pixels change under an unchanged name.
    pub fn clear(&self) -> Result<()> {
        self.write(AppliedRecord::default())
    }

    fn write(&self, record: AppliedRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory: {}", parent.display()))?;
        }

        let text = serde_json::to_string(&record).context("failed to encode applied state")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("failed to write state file: {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown_and_remembers_the_last_write() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppliedState::new(dir.path().join("applied.json"));

        assert_eq!(state.current(), None);

        state.set_current("img-1").unwrap();
        assert_eq!(state.current(), Some("img-1".to_string()));

        state.set_current("default").unwrap();
        assert_eq!(state.current(), Some("default".to_string()));
    }

    #[test]
    fn clear_returns_the_record_to_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppliedState::new(dir.path().join("applied.json"));

        state.set_current("img-1").unwrap();
        state.clear().unwrap();
        assert_eq!(state.current(), None);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applied.json");

        AppliedState::new(path.clone()).set_current("img-2").unwrap();
        assert_eq!(
            AppliedState::new(path).current(),
            Some("img-2".to_string())
        );
    }

    #[test]
    fn corrupt_record_reads_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("applied.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(AppliedState::new(path).current(), None);
    }
}
