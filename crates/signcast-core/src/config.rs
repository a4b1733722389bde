use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Content-root configuration, passed explicitly to every manager.
///
/// All five roots are stored relative to the project root and resolved
/// against it on demand. Loaded from `signcast.json` when present; every
/// field has a default so an empty file (or none at all) is a valid setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_template_dir")]
    pub template_dir: String,
    #[serde(default = "default_signage_dir")]
    pub signage_dir: String,
    #[serde(default = "default_channel_dir")]
    pub channel_dir: String,
    #[serde(default = "default_image_dir")]
    pub image_dir: String,
    #[serde(default = "default_video_dir")]
    pub video_dir: String,
}

fn default_data_dir() -> String {
    paths::DATA_DIR.to_string()
}

fn default_template_dir() -> String {
    paths::TEMPLATE_DIR.to_string()
}

fn default_signage_dir() -> String {
    paths::SIGNAGE_DIR.to_string()
}

fn default_channel_dir() -> String {
    paths::CHANNEL_DIR.to_string()
}

fn default_image_dir() -> String {
    paths::IMAGE_DIR.to_string()
}

fn default_video_dir() -> String {
    paths::VIDEO_DIR.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            template_dir: default_template_dir(),
            signage_dir: default_signage_dir(),
            channel_dir: default_channel_dir(),
            image_dir: default_image_dir(),
            video_dir: default_video_dir(),
        }
    }
}

impl Config {
    /// Load `<root>/signcast.json`, falling back to defaults if absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&data)?;
        Ok(config)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_json::to_string_pretty(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn data_root(&self, root: &Path) -> PathBuf {
        root.join(&self.data_dir)
    }

    pub fn template_root(&self, root: &Path) -> PathBuf {
        root.join(&self.template_dir)
    }

    pub fn signage_root(&self, root: &Path) -> PathBuf {
        root.join(&self.signage_dir)
    }

    pub fn channel_root(&self, root: &Path) -> PathBuf {
        root.join(&self.channel_dir)
    }

    pub fn image_root(&self, root: &Path) -> PathBuf {
        root.join(&self.image_dir)
    }

    pub fn video_root(&self, root: &Path) -> PathBuf {
        root.join(&self.video_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.image_dir, "media/image");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("signcast.json"),
            r#"{"data_dir": "content"}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, "content");
        assert_eq!(config.signage_dir, "signage");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.channel_dir = "channels".into();
        config.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.channel_dir, "channels");
    }
}
