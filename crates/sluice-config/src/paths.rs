//! Platform-specific paths for compositions and settings.
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/sluice/` (Linux), `~/Library/Application Support/sluice/` (macOS), `%APPDATA%\sluice\` (Windows)
//! - **User compositions**: `<user config>/compositions/`
//! - **Settings**: `<user config>/settings.toml`
//!
//! # Example
//!
//! ```rust,no_run
//! use sluice_config::paths;
//!
//! println!("Compositions: {:?}", paths::user_compositions_dir());
//!
//! if let Some(path) = paths::find_composition("heartbeat") {
//!     println!("Found composition at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

/// Directory name under the platform config directory.
const APP_NAME: &str = "sluice";

/// Subdirectory name for compositions.
const COMPOSITIONS_SUBDIR: &str = "compositions";

/// File name of the settings file.
const SETTINGS_FILE: &str = "settings.toml";

/// `<config_dir>/sluice`.
///
/// Falls back to `./sluice` when the platform has no config directory.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific compositions directory.
pub fn user_compositions_dir() -> PathBuf {
    user_config_dir().join(COMPOSITIONS_SUBDIR)
}

/// Returns the path of the user settings file.
pub fn settings_path() -> PathBuf {
    user_config_dir().join(SETTINGS_FILE)
}

/// Find a composition file by name or path.
///
/// `name` (with `.toml` appended if missing) is looked up in the user
/// compositions directory first, then treated as a file path.
pub fn find_composition(name: &str) -> Option<PathBuf> {
    find_composition_in(name, &user_compositions_dir())
}

fn find_composition_in(name: &str, dir: &Path) -> Option<PathBuf> {
    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    let user_path = dir.join(filename);
    if user_path.is_file() {
        return Some(user_path);
    }

    let path = PathBuf::from(name);
    path.is_file().then_some(path)
}

/// List composition files in the user compositions directory, sorted.
///
/// A missing or unreadable directory yields no compositions.
pub fn list_user_compositions() -> Vec<PathBuf> {
    list_compositions_in_dir(&user_compositions_dir())
}

fn list_compositions_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    files
}

/// Get the composition name from a file path (the file stem).
///
/// # Example
///
/// ```rust
/// use sluice_config::paths::composition_name_from_path;
/// use std::path::Path;
///
/// let name = composition_name_from_path(Path::new("/path/to/heartbeat.toml"));
/// assert_eq!(name, Some("heartbeat".to_string()));
/// ```
pub fn composition_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_user_dirs() {
        let config = user_config_dir();
        assert!(config.to_string_lossy().contains("sluice"));
        assert!(user_compositions_dir().starts_with(&config));
        assert_eq!(settings_path().file_name().unwrap(), "settings.toml");
    }

    #[test]
    fn test_find_composition_by_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("loop.toml");
        fs::write(&path, "name = \"Loop\"").unwrap();
        assert_eq!(find_composition(path.to_str().unwrap()), Some(path));
    }

    #[test]
    fn test_find_composition_adds_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("loop.toml");
        fs::write(&path, "name = \"Loop\"").unwrap();
        assert_eq!(find_composition_in("loop", temp_dir.path()), Some(path.clone()));
        assert_eq!(find_composition_in("loop.toml", temp_dir.path()), Some(path));
        assert_eq!(find_composition_in("other", temp_dir.path()), None);
    }

    #[test]
    fn test_list_compositions_in_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("b.toml"), "").unwrap();
        fs::write(temp_dir.path().join("a.toml"), "").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(temp_dir.path().join("dir.toml")).unwrap();

        let files = list_compositions_in_dir(temp_dir.path());
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| composition_name_from_path(p))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_list_compositions_nonexistent_dir() {
        assert!(list_compositions_in_dir(Path::new("/nonexistent/sluice/dir")).is_empty());
    }
}
