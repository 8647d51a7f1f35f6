// File-backed operator preferences
use crate::domain::preferences::Preferences;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("failed to write preferences to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stored preferences, or defaults when the file is missing or unreadable.
    pub async fn load(&self) -> Preferences {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read preferences, using defaults");
                return Preferences::default();
            }
        };

        match toml::from_str(&text) {
            Ok(preferences) => preferences,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "invalid preferences file, using defaults");
                Preferences::default()
            }
        }
    }

    pub async fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let io_error = |source| PreferencesError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let text = toml::to_string_pretty(preferences)?;
        tokio::fs::write(&self.path, text).await.map_err(io_error)?;

        tracing::debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("absent.toml"));

        let loaded = store.load().await;
        assert!(loaded.dark_mode);
        assert_eq!(loaded.chart_refresh_rate_ms, 5000);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferenceStore::new(dir.path().join("nested/prefs.toml"));

        let preferences = Preferences {
            dark_mode: false,
            chart_refresh_rate_ms: 1000,
        };
        store.save(&preferences).await.unwrap();

        assert_eq!(store.load().await, preferences);
    }

    #[tokio::test]
    async fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        tokio::fs::write(&path, "dark_mode = \"sometimes\"").await.unwrap();

        let loaded = PreferenceStore::new(&path).load().await;
        assert_eq!(loaded, Preferences::default());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        tokio::fs::write(&path, "chart_refresh_rate_ms = 2000").await.unwrap();

        let loaded = PreferenceStore::new(&path).load().await;
        assert!(loaded.dark_mode);
        assert_eq!(loaded.chart_refresh_rate_ms, 2000);
    }
}
