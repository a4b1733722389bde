use crate::error::{Result, SigncastError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DATA_DIR: &str = "data";
pub const TEMPLATE_DIR: &str = "template";
pub const SCENE_TEMPLATE_DIR: &str = "template/scene";
pub const FRAME_TEMPLATE_DIR: &str = "template/frame";
pub const SIGNAGE_DIR: &str = "signage";
pub const CHANNEL_DIR: &str = "channel";
pub const IMAGE_DIR: &str = "media/image";
pub const VIDEO_DIR: &str = "media/video";

pub const CONFIG_FILE: &str = "signcast.json";
pub const MANIFEST_FILE: &str = "manifest.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn type_dir(data_root: &Path, type_id: &str) -> PathBuf {
    data_root.join(type_id)
}

pub fn type_manifest(data_root: &Path, type_id: &str) -> PathBuf {
    type_dir(data_root, type_id).join(MANIFEST_FILE)
}

pub fn value_file(data_root: &Path, type_id: &str, value_id: &str) -> PathBuf {
    type_dir(data_root, type_id).join(format!("{value_id}.json"))
}

pub fn template_dir(template_root: &Path, kind: &str, template_id: &str) -> PathBuf {
    template_root.join(kind).join(template_id)
}

pub fn template_manifest(template_root: &Path, kind: &str, template_id: &str) -> PathBuf {
    template_dir(template_root, kind, template_id).join(MANIFEST_FILE)
}

pub fn signage_file(signage_root: &Path, signage_id: &str) -> PathBuf {
    signage_root.join(format!("{signage_id}.json"))
}

pub fn channel_file(channel_root: &Path, channel_id: &str) -> PathBuf {
    channel_root.join(format!("{channel_id}.json"))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap())
}

pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 || !id_re().is_match(id) {
        return Err(SigncastError::InvalidId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["menu_item", "a", "drinks2", "default_channel"] {
            validate_id(id).unwrap_or_else(|_| panic!("expected valid: {id}"));
        }
    }

    #[test]
    fn invalid_ids() {
        for id in [
            "",
            "1starts_with_digit",
            "_starts_with_underscore",
            "has space",
            "UPPER",
            "dash-ed",
        ] {
            assert!(validate_id(id).is_err(), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let data = Path::new("/tmp/proj/data");
        assert_eq!(
            type_manifest(data, "menu_item"),
            PathBuf::from("/tmp/proj/data/menu_item/manifest.json")
        );
        assert_eq!(
            value_file(data, "menu_item", "milk"),
            PathBuf::from("/tmp/proj/data/menu_item/milk.json")
        );
    }
}
