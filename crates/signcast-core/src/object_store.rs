use crate::datatype::{Lookups, MediaKind, ObjectType};
use crate::error::{ReferenceMap, Result, SigncastError};
use crate::media::MediaStore;
use crate::paths;
use crate::value::{ObjectValue, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// StoreLookups
// ---------------------------------------------------------------------------

/// Validation context wired to live stores: object references must resolve to
/// a registered value, file references to an existing media file.
pub struct StoreLookups<'a> {
    pub objects: &'a ObjectStore,
    pub media: &'a MediaStore,
}

impl Lookups for StoreLookups<'_> {
    fn has_object(&self, type_id: &str, value_id: &str) -> bool {
        self.objects.has_value(type_id, value_id)
    }

    fn has_media(&self, kind: MediaKind, file_name: &str) -> bool {
        self.media.has_file(kind, file_name)
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Owns every object type and value under one data root. One directory per
/// type (`<root>/<type_id>/manifest.json`), one JSON file per value.
#[derive(Debug, Default)]
pub struct ObjectStore {
    root: PathBuf,
    types: BTreeMap<String, ObjectType>,
    values: BTreeMap<String, BTreeMap<String, ObjectValue>>,
}

impl ObjectStore {
    // ---------------------------------------------------------------------------
    // Loading
    // ---------------------------------------------------------------------------

    /// Load every type directory, then every value file.
    ///
    /// Type registration runs in passes: a type is registered once all the
    /// types it references are registered, so forward references in manifest
    /// order resolve without a topological sort. A pass that registers
    /// nothing with work remaining means a reference cycle or a dangling
    /// `$type`; load fails naming every blocked type id.
    pub fn load(root: &Path) -> Result<Self> {
        let mut store = Self {
            root: root.to_path_buf(),
            types: BTreeMap::new(),
            values: BTreeMap::new(),
        };
        if !root.exists() {
            return Ok(store);
        }

        let mut pending = Vec::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let type_id = entry.file_name().to_string_lossy().into_owned();
            paths::validate_id(&type_id)?;
            let manifest = paths::type_manifest(root, &type_id);
            let data = std::fs::read_to_string(&manifest)?;
            let ty = ObjectType::parse_manifest(&type_id, &data, &manifest.to_string_lossy())?;
            pending.push(ty);
        }

        while !pending.is_empty() {
            let before = pending.len();
            let mut still_pending = Vec::new();
            for ty in pending {
                let resolved = ty
                    .referenced_types()
                    .iter()
                    .all(|dep| store.types.contains_key(*dep));
                if resolved {
                    store.types.insert(ty.id.clone(), ty);
                } else {
                    still_pending.push(ty);
                }
            }
            if still_pending.len() == before {
                let mut blocked: Vec<String> =
                    still_pending.into_iter().map(|ty| ty.id).collect();
                blocked.sort();
                return Err(SigncastError::UnresolvedTypes(blocked));
            }
            pending = still_pending;
        }

        let type_ids: Vec<String> = store.types.keys().cloned().collect();
        for type_id in type_ids {
            store.load_values(&type_id)?;
            let count = store.values.get(&type_id).map_or(0, |m| m.len());
            info!(type_id, values = count, "object type loaded");
        }
        Ok(store)
    }

    fn load_values(&mut self, type_id: &str) -> Result<()> {
        let ty = self.get_type(type_id)?.clone();
        let dir = paths::type_dir(&self.root, type_id);
        let mut loaded = BTreeMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(value_id) = name.strip_suffix(".json") else {
                continue;
            };
            if value_id == "manifest" {
                continue;
            }
            let data = std::fs::read_to_string(entry.path())?;
            let doc: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&data)?;
            loaded.insert(value_id.to_string(), ObjectValue::from_snapshot(value_id, &ty, &doc)?);
        }
        self.values.insert(type_id.to_string(), loaded);
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------------

    pub fn get_type(&self, type_id: &str) -> Result<&ObjectType> {
        self.types
            .get(type_id)
            .ok_or_else(|| SigncastError::TypeNotFound(type_id.to_string()))
    }

    pub fn types(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values()
    }

    pub fn get_value(&self, type_id: &str, value_id: &str) -> Result<&ObjectValue> {
        self.values
            .get(type_id)
            .and_then(|m| m.get(value_id))
            .ok_or_else(|| SigncastError::ValueNotFound {
                type_id: type_id.to_string(),
                value_id: value_id.to_string(),
            })
    }

    pub fn get_values(&self, type_id: &str) -> Result<Vec<&ObjectValue>> {
        self.get_type(type_id)?;
        Ok(self
            .values
            .get(type_id)
            .map(|m| m.values().collect())
            .unwrap_or_default())
    }

    pub fn has_value(&self, type_id: &str, value_id: &str) -> bool {
        self.values
            .get(type_id)
            .is_some_and(|m| m.contains_key(value_id))
    }

    // ---------------------------------------------------------------------------
    // Mutation gateways
    // ---------------------------------------------------------------------------

    /// Create a default-initialized value and synchronously persist it.
    pub fn create_value(&mut self, type_id: &str, value_id: &str) -> Result<()> {
        let ty = self.get_type(type_id)?.clone();
        if self.has_value(type_id, value_id) {
            return Err(SigncastError::IdExists(value_id.to_string()));
        }
        let value = ObjectValue::new_default(value_id, &ty)?;
        self.save_value(&ty, &value)?;
        self.values
            .entry(type_id.to_string())
            .or_default()
            .insert(value_id.to_string(), value);
        Ok(())
    }

    /// Validate, apply, then persist a single field. A rejected value
    /// leaves both memory and disk untouched.
    pub fn set_field(
        &mut self,
        media: &MediaStore,
        type_id: &str,
        value_id: &str,
        field_id: &str,
        value: Value,
    ) -> Result<()> {
        self.set_fields(media, type_id, value_id, vec![(field_id.to_string(), value)])
    }

    /// Multi-field variant: everything validates or nothing lands, and the
    /// file is written once.
    pub fn set_fields(
        &mut self,
        media: &MediaStore,
        type_id: &str,
        value_id: &str,
        updates: Vec<(String, Value)>,
    ) -> Result<()> {
        let ty = self.get_type(type_id)?.clone();
        let mut staged = self.get_value(type_id, value_id)?.clone();
        {
            let lookups = StoreLookups {
                objects: self,
                media,
            };
            staged.set_fields(&ty, updates, &lookups)?;
        }
        self.save_value(&ty, &staged)?;
        if let Some(map) = self.values.get_mut(type_id) {
            map.insert(value_id.to_string(), staged);
        }
        Ok(())
    }

    fn save_value(&self, ty: &ObjectType, value: &ObjectValue) -> Result<()> {
        let path = paths::value_file(&self.root, ty.id.as_str(), value.id());
        let doc = serde_json::Value::Object(value.snapshot(ty));
        let data = serde_json::to_string_pretty(&doc)?;
        crate::io::atomic_write(&path, data.as_bytes())?;
        debug!(type_id = %ty.id, value_id = %value.id(), "object value saved");
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Rename / removal primitives (gated by the ContentStore reference index)
    // ---------------------------------------------------------------------------

    /// Re-key a value and move its backing file. Referrer propagation is the
    /// caller's job and must happen before the old file disappears.
    pub(crate) fn rename_value(
        &mut self,
        type_id: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<()> {
        paths::validate_id(new_id)?;
        if self.has_value(type_id, new_id) {
            return Err(SigncastError::IdExists(new_id.to_string()));
        }
        let ty = self.get_type(type_id)?.clone();
        let mut value = self.get_value(type_id, old_id)?.clone();
        value.set_id(new_id);
        self.save_value(&ty, &value)?;
        if let Some(map) = self.values.get_mut(type_id) {
            map.remove(old_id);
            map.insert(new_id.to_string(), value);
        }
        let old_path = paths::value_file(&self.root, type_id, old_id);
        if old_path.exists() {
            std::fs::remove_file(old_path)?;
        }
        Ok(())
    }

    /// Rewrite, in every value, pointers at `target_type/old_id` to `new_id`,
    /// persisting each changed referrer.
    pub(crate) fn rename_references(
        &mut self,
        target_type: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<()> {
        let mut changed: Vec<(ObjectType, ObjectValue)> = Vec::new();
        for (type_id, map) in &mut self.values {
            let Some(ty) = self.types.get(type_id) else {
                continue;
            };
            for value in map.values_mut() {
                if value.rename_references(ty, target_type, old_id, new_id) {
                    changed.push((ty.clone(), value.clone()));
                }
            }
        }
        for (ty, value) in changed {
            self.save_value(&ty, &value)?;
        }
        Ok(())
    }

    pub(crate) fn remove_value_unchecked(&mut self, type_id: &str, value_id: &str) -> Result<()> {
        self.get_value(type_id, value_id)?;
        if let Some(map) = self.values.get_mut(type_id) {
            map.remove(value_id);
        }
        let path = paths::value_file(&self.root, type_id, value_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub(crate) fn remove_type_unchecked(&mut self, type_id: &str) -> Result<()> {
        self.get_type(type_id)?;
        self.types.remove(type_id);
        self.values.remove(type_id);
        let dir = paths::type_dir(&self.root, type_id);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Reference scans
    // ---------------------------------------------------------------------------

    /// Every value holding a pointer at `target_type/target_id`, keyed
    /// `object/<type>.<value>`.
    pub fn value_references(&self, target_type: &str, target_id: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for (type_id, map) in &self.values {
            let Some(ty) = self.types.get(type_id) else {
                continue;
            };
            for (value_id, value) in map {
                let fields = value.fields_referencing(ty, target_type, target_id);
                if !fields.is_empty() {
                    referrers.insert(
                        format!("object/{type_id}.{value_id}"),
                        format!("field '{}'", fields.join("', '")),
                    );
                }
            }
        }
        referrers
    }

    /// Every type whose schema depends on `target_type`, keyed `type/<id>`.
    pub fn type_references(&self, target_type: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        for ty in self.types.values() {
            if ty.id != target_type && ty.has_references(target_type) {
                referrers.insert(format!("type/{}", ty.id), "field schema".to_string());
            }
        }
        referrers
    }

    /// Surviving instances of a type; they block removing the type itself.
    pub fn instances_of(&self, type_id: &str) -> ReferenceMap {
        let mut referrers = ReferenceMap::new();
        if let Some(map) = self.values.get(type_id) {
            for value_id in map.keys() {
                referrers.insert(
                    format!("object/{type_id}.{value_id}"),
                    "instance of type".to_string(),
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

    fn write_manifest(root: &Path, type_id: &str, body: &str) {
        let dir = root.join(type_id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), body).unwrap();
    }

    fn menu_fixture(root: &Path) {
        write_manifest(
            root,
            "menu_item",
            r#"{
                "name": "Menu item",
                "fields": {
                    "name": ["Name", "", "str"],
                    "price": ["Price", "", "int"]
                }
            }"#,
        );
        write_manifest(
            root,
            "menu_group",
            r#"{
                "name": "Menu group",
                "fields": {
                    "name": ["Name", "", "str"],
                    "items": ["Items", "", "[0,50]$menu_item"]
                }
            }"#,
        );
        std::fs::write(
            root.join("menu_item/milk.json"),
            r#"{"name": "Milk", "price": 599}"#,
        )
        .unwrap();
        std::fs::write(
            root.join("menu_group/drinks.json"),
            r#"{"name": "Drinks", "items": ["milk"]}"#,
        )
        .unwrap();
    }

    fn empty_media(dir: &TempDir) -> MediaStore {
        MediaStore::new(dir.path().join("image"), dir.path().join("video"))
    }

    #[test]
    fn load_resolves_forward_references() {
        let dir = TempDir::new().unwrap();
        // menu_group may be visited before menu_item, making its $menu_item
        // reference a forward reference on the first pass.
        menu_fixture(dir.path());
        let store = ObjectStore::load(dir.path()).unwrap();

        assert_eq!(store.types().count(), 2);
        let milk = store.get_value("menu_item", "milk").unwrap();
        assert_eq!(milk.get("price").unwrap().as_int(), Some(599));
        let drinks = store.get_value("menu_group", "drinks").unwrap();
        assert!(drinks.get("items").unwrap().contains_ref("milk"));
    }

    #[test]
    fn load_fails_fast_on_cycle() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            "a",
            r#"{"fields": {"b": ["B", "", "$b"]}}"#,
        );
        write_manifest(
            dir.path(),
            "b",
            r#"{"fields": {"a": ["A", "", "$a"]}}"#,
        );
        let err = ObjectStore::load(dir.path()).unwrap_err();
        match err {
            SigncastError::UnresolvedTypes(blocked) => {
                assert_eq!(blocked, ["a", "b"]);
            }
            other => panic!("expected UnresolvedTypes, got {other}"),
        }
    }

    #[test]
    fn load_fails_on_dangling_type_reference() {
        let dir = TempDir::new().unwrap();
        write_manifest(
            dir.path(),
            "a",
            r#"{"fields": {"x": ["X", "", "$no_such_type"]}}"#,
        );
        let err = ObjectStore::load(dir.path()).unwrap_err();
        assert!(matches!(err, SigncastError::UnresolvedTypes(_)));
    }

    #[test]
    fn unknown_lookups_are_hard_errors() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let store = ObjectStore::load(dir.path()).unwrap();

        assert!(matches!(
            store.get_type("nope").unwrap_err(),
            SigncastError::TypeNotFound(_)
        ));
        assert!(matches!(
            store.get_value("menu_item", "nope").unwrap_err(),
            SigncastError::ValueNotFound { .. }
        ));
        assert!(store.get_values("nope").is_err());
    }

    #[test]
    fn create_value_persists_defaults() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let mut store = ObjectStore::load(dir.path()).unwrap();

        store.create_value("menu_item", "cola").unwrap();
        assert!(dir.path().join("menu_item/cola.json").exists());
        assert!(matches!(
            store.create_value("menu_item", "cola").unwrap_err(),
            SigncastError::IdExists(_)
        ));
    }

    #[test]
    fn set_field_validates_and_persists() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let media = empty_media(&dir);
        let mut store = ObjectStore::load(dir.path()).unwrap();

        store
            .set_field(&media, "menu_item", "milk", "price", Value::Int(299))
            .unwrap();
        assert_eq!(
            store
                .get_value("menu_item", "milk")
                .unwrap()
                .get("price")
                .unwrap()
                .as_int(),
            Some(299)
        );

        // Rejected mutation leaves memory and disk at 299.
        assert!(store
            .set_field(&media, "menu_item", "milk", "price", Value::Int(-1))
            .is_err());
        let on_disk = std::fs::read_to_string(dir.path().join("menu_item/milk.json")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&on_disk).unwrap();
        assert_eq!(doc["price"], 299);
    }

    #[test]
    fn object_field_requires_live_referent() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let media = empty_media(&dir);
        let mut store = ObjectStore::load(dir.path()).unwrap();

        let err = store.set_field(
            &media,
            "menu_group",
            "drinks",
            "items",
            Value::List(vec![Value::Str("no_such_item".into())]),
        );
        assert!(err.is_err());
        store
            .set_field(
                &media,
                "menu_group",
                "drinks",
                "items",
                Value::List(vec![Value::Str("milk".into())]),
            )
            .unwrap();
    }

    #[test]
    fn reference_scans() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let store = ObjectStore::load(dir.path()).unwrap();

        let refs = store.value_references("menu_item", "milk");
        assert_eq!(refs.len(), 1);
        assert!(refs.contains_key("object/menu_group.drinks"));

        assert!(store.value_references("menu_item", "cola").is_empty());

        let type_refs = store.type_references("menu_item");
        assert!(type_refs.contains_key("type/menu_group"));
        assert!(store.type_references("menu_group").is_empty());
    }

    #[test]
    fn rename_value_moves_file_and_reindexes() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let mut store = ObjectStore::load(dir.path()).unwrap();

        store.rename_value("menu_item", "milk", "whole_milk").unwrap();
        assert!(store.has_value("menu_item", "whole_milk"));
        assert!(!store.has_value("menu_item", "milk"));
        assert!(dir.path().join("menu_item/whole_milk.json").exists());
        assert!(!dir.path().join("menu_item/milk.json").exists());
    }

    #[test]
    fn rename_onto_existing_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let mut store = ObjectStore::load(dir.path()).unwrap();
        store.create_value("menu_item", "cola").unwrap();

        assert!(matches!(
            store.rename_value("menu_item", "milk", "cola").unwrap_err(),
            SigncastError::IdExists(_)
        ));
        assert!(store.has_value("menu_item", "milk"));
    }

    #[test]
    fn rename_references_rewrites_and_persists_referrers() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let mut store = ObjectStore::load(dir.path()).unwrap();

        store
            .rename_references("menu_item", "milk", "whole_milk")
            .unwrap();
        let drinks = store.get_value("menu_group", "drinks").unwrap();
        assert!(drinks.get("items").unwrap().contains_ref("whole_milk"));

        let on_disk = std::fs::read_to_string(dir.path().join("menu_group/drinks.json")).unwrap();
        assert!(on_disk.contains("whole_milk"));
    }

    #[test]
    fn remove_value_unchecked_deletes_backing_file() {
        let dir = TempDir::new().unwrap();
        menu_fixture(dir.path());
        let mut store = ObjectStore::load(dir.path()).unwrap();

        store.remove_value_unchecked("menu_item", "milk").unwrap();
        assert!(!store.has_value("menu_item", "milk"));
        assert!(!dir.path().join("menu_item/milk.json").exists());
    }
}
