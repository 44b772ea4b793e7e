use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The OS wallpaper API boundary. The applier only ever talks to this trait;
/// tests substitute a recording sink.
pub trait WallpaperSink: Send + Sync {
    fn set_wallpaper(&self, image: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DesktopKind {
    Gnome,
    Kde,
    Cosmic,
    Other,
}

fn detect_desktop() -> DesktopKind {
    let desktop = std::env::var("XDG_CURRENT_DESKTOP").unwrap_or_default();
    let desktop = desktop.to_ascii_lowercase();

    if desktop.contains("gnome") {
        DesktopKind::Gnome
    } else if desktop.contains("kde") {
        DesktopKind::Kde
    } else if desktop.contains("cosmic") {
        DesktopKind::Cosmic
    } else {
        DesktopKind::Other
    }
}

/// Sets the wallpaper through the current desktop's own mechanism.
pub struct DesktopSink;

impl WallpaperSink for DesktopSink {
    fn set_wallpaper(&self, image: &Path) -> Result<()> {
        match detect_desktop() {
            DesktopKind::Gnome => gnome_set(image).context("GNOME wallpaper"),
            DesktopKind::Kde => kde_set(image).context("KDE wallpaper"),
            DesktopKind::Cosmic => cosmic_set(image).context("COSMIC wallpaper"),
            DesktopKind::Other => Err(anyhow!(
                "no wallpaper backend for this desktop (XDG_CURRENT_DESKTOP)"
            )),
        }
    }
}

fn file_uri(path: &Path) -> Result<String> {
    let s = path
        .to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
    Ok(format!("file://{s}"))
}

fn gnome_set(image: &Path) -> Result<()> {
    let uri = file_uri(image)?;

    // `gsettings` is the stable CLI for dconf-backed settings.
    let status = Command::new("gsettings")
        .args(["set", "org.gnome.desktop.background", "picture-uri", &uri])
        .status()
        .context("run gsettings (picture-uri)")?;
    if !status.success() {
        return Err(anyhow!("gsettings failed (picture-uri)"));
    }

    // Best-effort: dark variant (GNOME 42+) and fill scaling.
    let _ = Command::new("gsettings")
        .args(["set", "org.gnome.desktop.background", "picture-uri-dark", &uri])
        .status();
    let _ = Command::new("gsettings")
        .args(["set", "org.gnome.desktop.background", "picture-options", "zoom"])
        .status();

    Ok(())
}

fn find_qdbus() -> Option<&'static str> {
    // Plasma 6 usually ships qdbus6, Plasma 5 ships qdbus.
    for exe in ["qdbus6", "qdbus"] {
        if Command::new(exe).arg("--version").output().is_ok() {
            return Some(exe);
        }
    }
    None
}

fn kde_set(image: &Path) -> Result<()> {
    let qdbus = find_qdbus().ok_or_else(|| anyhow!("qdbus not found (qdbus6/qdbus)"))?;
    let uri = file_uri(image)?;

    let script = format!(
        "var allDesktops = desktops();\n\
         for (var i = 0; i < allDesktops.length; i++) {{\n\
           var d = allDesktops[i];\n\
           d.wallpaperPlugin = 'org.kde.image';\n\
           d.currentConfigGroup = ['Wallpaper', 'org.kde.image', 'General'];\n\
           d.writeConfig('Image', '{uri}');\n\
         }}\n"
    );

    let status = Command::new(qdbus)
        .args([
            "org.kde.plasmashell",
            "/PlasmaShell",
            "org.kde.PlasmaShell.evaluateScript",
            &script,
        ])
        .status()
        .with_context(|| format!("run {qdbus} PlasmaShell.evaluateScript"))?;
    if !status.success() {
        return Err(anyhow!("qdbus wallpaper script failed"));
    }

    Ok(())
}

fn config_home() -> Result<PathBuf> {
    if let Some(v) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(v));
    }
    let home = std::env::var_os("HOME").ok_or_else(|| anyhow!("HOME not set"))?;
    Ok(PathBuf::from(home).join(".config"))
}

fn cosmic_set(image: &Path) -> Result<()> {
    // cosmic-bg watches cosmic-config files; rewrite the source path inside
    // the existing blob rather than regenerating it.
    let base = config_home()?.join("cosmic/com.system76.CosmicBackground/v1");
    let all = base.join("all");

    std::fs::write(base.join("same-on-all"), b"true\n").context("write same-on-all")?;

    let mut text = std::fs::read_to_string(&all).with_context(|| {
        format!(
            "read {} (open COSMIC wallpaper settings once first)",
            all.display()
        )
    })?;

    let needle = "source: Path(\"";
    let start = text
        .find(needle)
        .ok_or_else(|| anyhow!("COSMIC config: missing `source: Path(\"...\")`"))?;
    let path_start = start + needle.len();
    let end_rel = text[path_start..]
        .find("\")")
        .ok_or_else(|| anyhow!("COSMIC config: unterminated source path"))?;

    let new_path = image
        .to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
    text.replace_range(path_start..path_start + end_rel, new_path);

    std::fs::write(&all, text).with_context(|| format!("write {}", all.display()))?;
    Ok(())
}
