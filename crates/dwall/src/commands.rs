use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use std::path::{Path, PathBuf};

use dwalld::config;
use dwalld::db::RuleStore;
use dwalld::images::ImageStore;
use dwalld::ipc;
use dwalld::rules::{renumber, Mode, TimeWindow, WallpaperRule, DEFAULT_WALLPAPER, MAX_RULES};
use dwalld::state::AppliedState;

/// Resolved locations the CLI works against; defaults match the daemon's.
pub struct Paths {
    pub db_path: PathBuf,
    pub images_dir: PathBuf,
    pub state_path: PathBuf,
}

impl Paths {
    pub fn resolve(data_dir: Option<PathBuf>) -> Self {
        match data_dir {
            Some(dir) => Self {
                db_path: dir.join("dwall.db"),
                images_dir: dir.join("wallpapers"),
                state_path: dir.join("applied.json"),
            },
            None => Self {
                db_path: config::default_db_path(),
                images_dir: config::default_images_dir(),
                state_path: config::default_state_path(),
            },
        }
    }
}

pub fn add(
    paths: &Paths,
    name: String,
    wifi: Option<String>,
    time: Option<String>,
    image: &Path,
) -> Result<()> {
    let (mode, selector) = match (wifi, time) {
        (Some(ssid), None) => {
            let ssid = dwalld::rules::strip_ssid_quotes(&ssid).to_string();
            if ssid.is_empty() {
                bail!("--wifi requires a non-empty SSID");
            }
            (Mode::Wifi, ssid)
        }
        (None, Some(window)) => (Mode::Time, parse_time_argument(&window)?),
        _ => bail!("exactly one of --wifi or --time is required"),
    };
    if name.is_empty() {
        bail!("--name must not be empty");
    }

    let store = RuleStore::open(&paths.db_path)?;
    let rules = store.list_all()?;
    if rules.len() >= MAX_RULES {
        bail!("rule limit reached ({MAX_RULES}); remove one first");
    }

    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image: {}", image.display()))?;
    let images = ImageStore::new(paths.images_dir.clone());
    let stored = images.save(&bytes)?;

    let rule = WallpaperRule {
        position: rules.len() as i64,
        name,
        mode,
        selector,
        image: stored,
    };
    persist_new_rule(&store, &images, &rule)?;

    println!("added rule {} at position {}", rule.name, rule.position);
    poke_daemon();
    Ok(())
}

/// The image is already in the store at this point; a rule that cannot be
/// persisted must not leave it orphaned.
fn persist_new_rule(store: &RuleStore, images: &ImageStore, rule: &WallpaperRule) -> Result<()> {
    let persisted = if rule.is_complete() {
        store.insert_or_replace(rule)
    } else {
        Err(anyhow!("rule is missing a name, mode, or image"))
    };

    if let Err(err) = persisted {
        images.delete(&rule.image);
        return Err(err);
    }
    Ok(())
}

pub fn list(paths: &Paths) -> Result<()> {
    let store = RuleStore::open(&paths.db_path)?;
    let rules = store.list_all()?;
    if rules.is_empty() {
        println!("no rules");
        return Ok(());
    }

    println!("{:<4} {:<20} {:<6} {:<20} image", "pos", "name", "mode", "selector");
    for rule in rules {
        println!(
            "{:<4} {:<20} {:<6} {:<20} {}",
            rule.position,
            rule.name,
            rule.mode.as_str(),
            rule.selector,
            rule.image
        );
    }
    Ok(())
}

pub fn move_rule(paths: &Paths, from: usize, to: usize) -> Result<()> {
    let mut store = RuleStore::open(&paths.db_path)?;
    let mut rules = store.list_all()?;

    if from >= rules.len() || to >= rules.len() {
        bail!("positions must be below {}", rules.len());
    }

    let rule = rules.remove(from);
    rules.insert(to, rule);
    renumber(&mut rules);
    store.replace_all(&rules)?;

    println!("moved rule {from} -> {to}");
    poke_daemon();
    Ok(())
}

pub fn remove(paths: &Paths, position: usize) -> Result<()> {
    let mut store = RuleStore::open(&paths.db_path)?;
    let mut rules = store.list_all()?;

    if position >= rules.len() {
        bail!("no rule at position {position}");
    }

    let removed = rules.remove(position);
    if !ImageStore::new(paths.images_dir.clone()).delete(&removed.image) {
        warn!("stored image {} was already missing", removed.image);
    }
    renumber(&mut rules);
    store.replace_all(&rules)?;

    println!("removed rule {}", removed.name);
    poke_daemon();
    Ok(())
}

pub fn set_default(paths: &Paths, image: &Path) -> Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("failed to read image: {}", image.display()))?;
    ImageStore::new(paths.images_dir.clone()).save_as(DEFAULT_WALLPAPER, &bytes)?;

    forget_applied_default(&AppliedState::new(paths.state_path.clone()))?;

    println!("default wallpaper stored");
    poke_daemon();
    Ok(())
}

/// The applier keys its idempotence check on the image name, and the default
/// keeps its name when replaced. Clearing the record makes the next
/// resolution write the new pixels instead of skipping.
fn forget_applied_default(state: &AppliedState) -> Result<()> {
    if state.current().as_deref() == Some(DEFAULT_WALLPAPER) {
        state.clear()?;
    }
    Ok(())
}

pub fn status() -> Result<()> {
    match ipc::status() {
        Ok(msg) => {
            println!("{msg}");
            Ok(())
        }
        Err(err) => Err(err).context("daemon not reachable (is dwalld running?)"),
    }
}

/// `HH:MM-HH:MM` on the command line; stored as the `"HH:MM HH:MM"` selector.
fn parse_time_argument(arg: &str) -> Result<String> {
    let (start, end) = arg
        .split_once('-')
        .ok_or_else(|| anyhow!("--time expects HH:MM-HH:MM, got {arg:?}"))?;
    let window = TimeWindow::parse(&format!("{} {}", start.trim(), end.trim()))
        .with_context(|| format!("--time expects HH:MM-HH:MM, got {arg:?}"))?;
    Ok(window.to_selector())
}

/// Mutations take effect immediately when the daemon is up; when it is not,
/// the next daemon start resolves from the fresh store anyway.
fn poke_daemon() {
    if let Err(err) = ipc::refresh() {
        warn!("daemon not notified: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wifi_rule(position: i64, image: &str) -> WallpaperRule {
        WallpaperRule {
            position,
            name: format!("rule-{position}"),
            mode: Mode::Wifi,
            selector: "Home".to_string(),
            image: image.to_string(),
        }
    }

    #[test]
    fn add_refuses_a_sixth_rule() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path().to_path_buf()));

        let store = RuleStore::open(&paths.db_path).unwrap();
        for pos in 0..MAX_RULES as i64 {
            store
                .insert_or_replace(&wifi_rule(pos, &format!("img-{pos}")))
                .unwrap();
        }
        drop(store);

        let err = add(
            &paths,
            "sixth".to_string(),
            Some("Cafe".to_string()),
            None,
            Path::new("unused.png"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("rule limit"));

        let store = RuleStore::open(&paths.db_path).unwrap();
        assert_eq!(store.list_all().unwrap().len(), MAX_RULES);
    }

    #[test]
    fn failed_persist_discards_the_copied_image() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::resolve(Some(dir.path().to_path_buf()));
        let store = RuleStore::open(&paths.db_path).unwrap();

        let images = ImageStore::new(paths.images_dir.clone());
        std::fs::create_dir_all(&paths.images_dir).unwrap();
        std::fs::write(images.path("171"), b"bytes").unwrap();
        std::fs::write(images.thumbnail_path("171"), b"bytes").unwrap();

        let mut rule = wifi_rule(0, "171");
        rule.name.clear();
        assert!(persist_new_rule(&store, &images, &rule).is_err());

        assert!(!images.contains("171"));
        assert!(!images.thumbnail_path("171").exists());
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn replacing_the_default_forgets_an_applied_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppliedState::new(dir.path().join("applied.json"));

        state.set_current(DEFAULT_WALLPAPER).unwrap();
        forget_applied_default(&state).unwrap();
        assert_eq!(state.current(), None);

        // A recorded rule image is left alone.
        state.set_current("img-1").unwrap();
        forget_applied_default(&state).unwrap();
        assert_eq!(state.current(), Some("img-1".to_string()));
    }

    #[test]
    fn time_argument_parses_to_a_selector() {
        assert_eq!(parse_time_argument("08:00-18:30").unwrap(), "08:00 18:30");
        assert_eq!(parse_time_argument("22:00-06:00").unwrap(), "22:00 06:00");
    }

    #[test]
    fn bad_time_arguments_are_rejected() {
        assert!(parse_time_argument("08:00").is_err());
        assert!(parse_time_argument("8-6").is_err());
        assert!(parse_time_argument("08:00-25:00").is_err());
    }
}
