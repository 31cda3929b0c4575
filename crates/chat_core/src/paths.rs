use std::path::PathBuf;

/// Configuration directory (~/.voxchat)
pub fn voxchat_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".voxchat")
}

pub fn config_json_path() -> PathBuf {
    voxchat_dir().join("config.json")
}

/// Saved preferences written after settings change.
pub fn settings_json_path() -> PathBuf {
    voxchat_dir().join("settings.json")
}

/// Local archive used when nobody is signed in.
pub fn archive_json_path() -> PathBuf {
    voxchat_dir().join("sessions.json")
}

pub fn ensure_voxchat_dir() -> std::io::Result<PathBuf> {
    let dir = voxchat_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
