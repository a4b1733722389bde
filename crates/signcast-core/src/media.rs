use crate::datatype::MediaKind;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// File-backed media roots for image and video fields.
///
/// A media value's identity is its filename; validity is existence under the
/// matching root. No registry is kept in memory, the filesystem is the
/// source of truth.
#[derive(Debug, Clone)]
pub struct MediaStore {
    image_root: PathBuf,
    video_root: PathBuf,
}

impl MediaStore {
    pub fn new(image_root: PathBuf, video_root: PathBuf) -> Self {
        Self {
            image_root,
            video_root,
        }
    }

    pub fn root(&self, kind: MediaKind) -> &Path {
        match kind {
            MediaKind::Image => &self.image_root,
            MediaKind::Video => &self.video_root,
        }
    }

    pub fn file_path(&self, kind: MediaKind, file_name: &str) -> PathBuf {
        self.root(kind).join(file_name)
    }

    pub fn has_file(&self, kind: MediaKind, file_name: &str) -> bool {
        // Reject anything that could step outside the media root.
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return false;
        }
        self.file_path(kind, file_name).is_file()
    }

    /// Filenames under the given root, sorted.
    pub fn list(&self, kind: MediaKind) -> Result<Vec<String>> {
        let root = self.root(kind);
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> MediaStore {
        let image = dir.path().join("image");
        let video = dir.path().join("video");
        std::fs::create_dir_all(&image).unwrap();
        std::fs::create_dir_all(&video).unwrap();
        MediaStore::new(image, video)
    }

    #[test]
    fn has_file_checks_existence_per_root() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);
        std::fs::write(media.file_path(MediaKind::Image, "logo.png"), b"png").unwrap();

        assert!(media.has_file(MediaKind::Image, "logo.png"));
        assert!(!media.has_file(MediaKind::Video, "logo.png"));
        assert!(!media.has_file(MediaKind::Image, "missing.png"));
    }

    #[test]
    fn has_file_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);
        assert!(!media.has_file(MediaKind::Image, "../escape.png"));
        assert!(!media.has_file(MediaKind::Image, ""));
    }

    #[test]
    fn list_is_sorted_and_files_only() {
        let dir = TempDir::new().unwrap();
        let media = store(&dir);
        std::fs::write(media.file_path(MediaKind::Video, "b.mp4"), b"").unwrap();
        std::fs::write(media.file_path(MediaKind::Video, "a.mp4"), b"").unwrap();
        std::fs::create_dir(media.file_path(MediaKind::Video, "subdir")).unwrap();

        assert_eq!(media.list(MediaKind::Video).unwrap(), ["a.mp4", "b.mp4"]);
        assert_eq!(media.list(MediaKind::Image).unwrap(), Vec::<String>::new());
    }
}
