use crate::datatype::{DataType, Lookups, ObjectType};
use crate::error::{Result, SigncastError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A field value. Dates are stored as fixed-format strings; Object and File
/// fields store the referenced id / filename, never an inline copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True if this value is, or contains as a list element, the string `id`.
    pub fn contains_ref(&self, id: &str) -> bool {
        match self {
            Value::Str(s) => s == id,
            Value::List(items) => items.iter().any(|v| v.contains_ref(id)),
            _ => false,
        }
    }

    /// Replace `old_id` with `new_id` wherever it appears (directly or as a
    /// list element). Returns true if anything changed.
    pub fn rename_ref(&mut self, old_id: &str, new_id: &str) -> bool {
        match self {
            Value::Str(s) if s == old_id => {
                *s = new_id.to_string();
                true
            }
            Value::List(items) => {
                let mut changed = false;
                for item in items {
                    changed |= item.rename_ref(old_id, new_id);
                }
                changed
            }
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// ObjectValue
// ---------------------------------------------------------------------------

/// A typed instance: one value per declared field of its ObjectType.
///
/// All mutation goes through [`ObjectValue::set_field`], which validates
/// before applying; persistence and id changes are the owning manager's job.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    id: String,
    type_id: String,
    values: BTreeMap<String, Value>,
}

impl ObjectValue {
    /// A fresh instance carrying every field's default.
    pub fn new_default(id: &str, ty: &ObjectType) -> Result<Self> {
        paths::validate_id(id)?;
        let values = ty
            .fields
            .iter()
            .map(|f| (f.id.clone(), f.data_type.default_value()))
            .collect();
        Ok(Self {
            id: id.to_string(),
            type_id: ty.id.clone(),
            values,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Used by the owning manager after rename propagation; grammar and
    /// collision checks happen there.
    pub(crate) fn set_id(&mut self, new_id: &str) {
        self.id = new_id.to_string();
    }

    pub fn get(&self, field_id: &str) -> Result<&Value> {
        self.values
            .get(field_id)
            .ok_or_else(|| SigncastError::UnknownField {
                type_id: self.type_id.clone(),
                field: field_id.to_string(),
            })
    }

    /// The single mutation gateway: reject first, apply only on success.
    /// List length bounds are enforced here; element validity by `is_valid`.
    pub fn set_field(
        &mut self,
        ty: &ObjectType,
        field_id: &str,
        value: Value,
        lookups: &dyn Lookups,
    ) -> Result<()> {
        let field = ty.field(field_id).ok_or_else(|| SigncastError::UnknownField {
            type_id: ty.id.clone(),
            field: field_id.to_string(),
        })?;

        if let (DataType::List(list), Value::List(items)) = (&field.data_type, &value) {
            if items.len() < list.min_len() || items.len() > list.max_len() {
                return Err(SigncastError::InvalidValue {
                    field: field_id.to_string(),
                    reason: format!(
                        "list length {} outside [{}, {}]",
                        items.len(),
                        list.min_len(),
                        list.max_len()
                    ),
                });
            }
        }

        if !field.data_type.is_valid(&value, lookups) {
            return Err(SigncastError::InvalidValue {
                field: field_id.to_string(),
                reason: format!("{value:?} is not a valid {}", field.data_type.kind_str()),
            });
        }

        self.values.insert(field_id.to_string(), value);
        Ok(())
    }

    /// Multi-field variant: validates every field before applying any, so a
    /// bad field leaves the whole instance untouched.
    pub fn set_fields(
        &mut self,
        ty: &ObjectType,
        updates: Vec<(String, Value)>,
        lookups: &dyn Lookups,
    ) -> Result<()> {
        let mut staged = self.clone();
        for (field_id, value) in updates {
            staged.set_field(ty, &field_id, value, lookups)?;
        }
        *self = staged;
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Snapshot (on-disk shape)
    // ---------------------------------------------------------------------------

    /// Field snapshot in declaration order, references flattened to ids.
    pub fn snapshot(&self, ty: &ObjectType) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::with_capacity(ty.fields.len());
        for field in &ty.fields {
            let value = self.values.get(&field.id).cloned().unwrap_or(Value::Null);
            map.insert(
                field.id.clone(),
                serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
            );
        }
        map
    }

    /// Rebuild from a snapshot. Declared fields missing from the document
    /// fall back to their defaults; undeclared keys are ignored.
    pub fn from_snapshot(
        id: &str,
        ty: &ObjectType,
        doc: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self> {
        let mut value = Self::new_default(id, ty)?;
        for field in &ty.fields {
            if let Some(raw) = doc.get(&field.id) {
                let parsed: Value =
                    serde_json::from_value(raw.clone()).map_err(|e| SigncastError::InvalidValue {
                        field: field.id.clone(),
                        reason: e.to_string(),
                    })?;
                value.values.insert(field.id.clone(), parsed);
            }
        }
        Ok(value)
    }

    // ---------------------------------------------------------------------------
    // Reference scanning
    // ---------------------------------------------------------------------------

    /// Field ids whose value points at `target_type`/`target_id`.
    pub fn fields_referencing(
        &self,
        ty: &ObjectType,
        target_type: &str,
        target_id: &str,
    ) -> Vec<String> {
        ty.fields
            .iter()
            .filter(|f| f.data_type.referenced_type() == Some(target_type))
            .filter(|f| {
                self.values
                    .get(&f.id)
                    .is_some_and(|v| v.contains_ref(target_id))
            })
            .map(|f| f.id.clone())
            .collect()
    }

    /// Rewrite every pointer at `target_type`/`old_id` to `new_id`.
    /// Returns true if anything changed.
    pub fn rename_references(
        &mut self,
        ty: &ObjectType,
        target_type: &str,
        old_id: &str,
        new_id: &str,
    ) -> bool {
        let mut changed = false;
        for field in &ty.fields {
            if field.data_type.referenced_type() != Some(target_type) {
                continue;
            }
            if let Some(v) = self.values.get_mut(&field.id) {
                changed |= v.rename_ref(old_id, new_id);
            }
        }
        changed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::NoLookups;

    fn menu_item_type() -> ObjectType {
        ObjectType::parse_manifest(
            "menu_item",
            r#"{
                "name": "Menu item",
                "fields": {
                    "name": ["Name", "", "str"],
                    "price": ["Price", "", "int"]
                }
            }"#,
            "test",
        )
        .unwrap()
    }

    fn menu_group_type() -> ObjectType {
        ObjectType::parse_manifest(
            "menu_group",
            r#"{
                "name": "Menu group",
                "fields": {
                    "name": ["Name", "", "str"],
                    "items": ["Items", "", "[0,50]$menu_item"]
                }
            }"#,
            "test",
        )
        .unwrap()
    }

    struct AllObjects;

    impl Lookups for AllObjects {
        fn has_object(&self, _type_id: &str, _value_id: &str) -> bool {
            true
        }
        fn has_media(&self, _kind: crate::datatype::MediaKind, _file_name: &str) -> bool {
            false
        }
    }

    #[test]
    fn new_default_fills_every_field() {
        let ty = menu_item_type();
        let v = ObjectValue::new_default("milk", &ty).unwrap();
        assert_eq!(v.get("name").unwrap(), &Value::Str(String::new()));
        assert_eq!(v.get("price").unwrap(), &Value::Int(0));
    }

    #[test]
    fn invalid_id_rejected() {
        let ty = menu_item_type();
        assert!(ObjectValue::new_default("Milk!", &ty).is_err());
    }

    #[test]
    fn set_field_rejects_and_leaves_prior_value() {
        let ty = menu_item_type();
        let mut v = ObjectValue::new_default("milk", &ty).unwrap();
        v.set_field(&ty, "price", Value::Int(299), &NoLookups).unwrap();

        let err = v
            .set_field(&ty, "price", Value::Str("free".into()), &NoLookups)
            .unwrap_err();
        assert!(matches!(err, SigncastError::InvalidValue { .. }));
        assert_eq!(v.get("price").unwrap(), &Value::Int(299));

        assert!(v
            .set_field(&ty, "no_such_field", Value::Int(1), &NoLookups)
            .is_err());
    }

    #[test]
    fn set_fields_is_atomic() {
        let ty = menu_item_type();
        let mut v = ObjectValue::new_default("milk", &ty).unwrap();
        let err = v.set_fields(
            &ty,
            vec![
                ("name".into(), Value::Str("Milk".into())),
                ("price".into(), Value::Bool(true)),
            ],
            &NoLookups,
        );
        assert!(err.is_err());
        // First update must not have landed.
        assert_eq!(v.get("name").unwrap(), &Value::Str(String::new()));
    }

    #[test]
    fn list_length_enforced_by_setter() {
        let ty = menu_group_type();
        let mut v = ObjectValue::new_default("drinks", &ty).unwrap();
        let too_long = Value::List(vec![Value::Str("milk".into()); 51]);
        assert!(v.set_field(&ty, "items", too_long, &AllObjects).is_err());
        let ok = Value::List(vec![Value::Str("milk".into())]);
        v.set_field(&ty, "items", ok, &AllObjects).unwrap();
    }

    #[test]
    fn snapshot_round_trips() {
        let ty = menu_group_type();
        let mut v = ObjectValue::new_default("drinks", &ty).unwrap();
        v.set_field(&ty, "name", Value::Str("Drinks".into()), &NoLookups)
            .unwrap();
        v.set_field(
            &ty,
            "items",
            Value::List(vec![Value::Str("milk".into()), Value::Str("cola".into())]),
            &AllObjects,
        )
        .unwrap();

        let snap = v.snapshot(&ty);
        let keys: Vec<&String> = snap.keys().collect();
        assert_eq!(keys, ["name", "items"]);

        let back = ObjectValue::from_snapshot("drinks", &ty, &snap).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn snapshot_missing_field_uses_default() {
        let ty = menu_item_type();
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"name": "Milk"}"#).unwrap();
        let v = ObjectValue::from_snapshot("milk", &ty, &doc).unwrap();
        assert_eq!(v.get("price").unwrap(), &Value::Int(0));
        assert_eq!(v.get("name").unwrap(), &Value::Str("Milk".into()));
    }

    #[test]
    fn reference_scan_and_rename() {
        let ty = menu_group_type();
        let mut v = ObjectValue::new_default("drinks", &ty).unwrap();
        v.set_field(
            &ty,
            "items",
            Value::List(vec![Value::Str("milk".into())]),
            &AllObjects,
        )
        .unwrap();

        assert_eq!(
            v.fields_referencing(&ty, "menu_item", "milk"),
            vec!["items".to_string()]
        );
        assert!(v.fields_referencing(&ty, "menu_item", "cola").is_empty());

        assert!(v.rename_references(&ty, "menu_item", "milk", "whole_milk"));
        assert!(v.get("items").unwrap().contains_ref("whole_milk"));
        assert!(!v.rename_references(&ty, "menu_item", "milk", "whole_milk"));
    }
}
