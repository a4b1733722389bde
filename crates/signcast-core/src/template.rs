use crate::datatype::ObjectType;
use crate::error::{ReferenceMap, Result, SigncastError};
use crate::object_store::ObjectStore;
use crate::paths;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Scene,
    Frame,
}

impl TemplateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::Scene => "scene",
            TemplateKind::Frame => "frame",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// A presentation template: a schema for the data it accepts plus the asset
/// directory the external renderer reads from.
#[derive(Debug, Clone)]
pub struct Template {
    pub id: String,
    pub kind: TemplateKind,
    pub definition: ObjectType,
    pub root_dir: PathBuf,
}

// ---------------------------------------------------------------------------
// TemplateStore
// ---------------------------------------------------------------------------

/// Scene and frame templates under one template root. Templates load once at
/// startup and are immutable for the life of the process.
#[derive(Debug, Default)]
pub struct TemplateStore {
    scenes: BTreeMap<String, Template>,
    frames: BTreeMap<String, Template>,
}

impl TemplateStore {
    pub fn load(template_root: &Path, objects: &ObjectStore) -> Result<Self> {
        Ok(Self {
            scenes: Self::load_kind(template_root, TemplateKind::Scene, objects)?,
            frames: Self::load_kind(template_root, TemplateKind::Frame, objects)?,
        })
    }

    fn load_kind(
        template_root: &Path,
        kind: TemplateKind,
        objects: &ObjectStore,
    ) -> Result<BTreeMap<String, Template>> {
        let dir = template_root.join(kind.as_str());
        let mut templates = BTreeMap::new();
        if !dir.exists() {
            return Ok(templates);
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let template_id = entry.file_name().to_string_lossy().into_owned();
            paths::validate_id(&template_id)?;
            let manifest = paths::template_manifest(template_root, kind.as_str(), &template_id);
            let data = std::fs::read_to_string(&manifest)?;
            let definition =
                ObjectType::parse_manifest(&template_id, &data, &manifest.to_string_lossy())?;
            // A template schema may point at object types; they must already
            // be loaded.
            for dep in definition.referenced_types() {
                objects.get_type(dep)?;
            }
            info!(template_id, kind = %kind, "template loaded");
            templates.insert(
                template_id.clone(),
                Template {
                    id: template_id,
                    kind,
                    definition,
                    root_dir: entry.path(),
                },
            );
        }
        Ok(templates)
    }

    pub fn get_scene_template(&self, template_id: &str) -> Result<&Template> {
        self.scenes
            .get(template_id)
            .ok_or_else(|| SigncastError::TemplateNotFound(template_id.to_string()))
    }

    pub fn get_frame_template(&self, template_id: &str) -> Result<&Template> {
        self.frames
            .get(template_id)
            .ok_or_else(|| SigncastError::TemplateNotFound(template_id.to_string()))
    }

    pub fn scene_templates(&self) -> impl Iterator<Item = &Template> {
        self.scenes.values()
    }

    pub fn frame_templates(&self) -> impl Iterator<Item = &Template> {
        self.frames.values()
    }

    /// Templates whose definition depends on `target_type`, keyed
    /// `template/<kind>.<id>`.
    pub fn type_references(&self, target_type: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for template in self.scenes.values().chain(self.frames.values()) {
            if template.definition.has_references(target_type) {
                referrers.insert(
                    format!("template/{}.{}", template.kind, template.id),
                    "field schema".to_string(),
                );
            }
        }
        referrers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_template(root: &Path, kind: &str, id: &str, body: &str) {
        let dir = root.join(kind).join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), body).unwrap();
    }

    #[test]
    fn loads_scene_and_frame_templates() {
        let dir = TempDir::new().unwrap();
        write_template(
            dir.path(),
            "scene",
            "menu_board",
            r#"{"name": "Menu board", "fields": {"title": ["Title", "", "str"]}}"#,
        );
        write_template(
            dir.path(),
            "frame",
            "clock",
            r#"{"name": "Clock", "fields": {"city": ["City", "", "str"]}}"#,
        );

        let objects = ObjectStore::default();
        let store = TemplateStore::load(dir.path(), &objects).unwrap();
        assert_eq!(store.get_scene_template("menu_board").unwrap().id, "menu_board");
        assert_eq!(store.get_frame_template("clock").unwrap().kind, TemplateKind::Frame);
        assert!(store.get_scene_template("clock").is_err());
    }

    #[test]
    fn template_referencing_unknown_type_fails_load() {
        let dir = TempDir::new().unwrap();
        write_template(
            dir.path(),
            "scene",
            "menu_board",
            r#"{"fields": {"group": ["Group", "", "$menu_group"]}}"#,
        );
        let objects = ObjectStore::default();
        assert!(TemplateStore::load(dir.path(), &objects).is_err());
    }

    #[test]
    fn type_references_cover_both_kinds() {
        let dir = TempDir::new().unwrap();
        let data_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(data_dir.path().join("menu_group")).unwrap();
        std::fs::write(
            data_dir.path().join("menu_group/manifest.json"),
            r#"{"fields": {"name": ["Name", "", "str"]}}"#,
        )
        .unwrap();
        let objects = ObjectStore::load(data_dir.path()).unwrap();

        write_template(
            dir.path(),
            "scene",
            "menu_board",
            r#"{"fields": {"group": ["Group", "", "$menu_group"]}}"#,
        );
        let store = TemplateStore::load(dir.path(), &objects).unwrap();

        let refs = store.type_references("menu_group");
        assert!(refs.contains_key("template/scene.menu_board"));
        assert!(store.type_references("menu_item").is_empty());
    }
}
