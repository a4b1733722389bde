use crate::error::{Result, SigncastError};
use crate::paths;
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Wire format for Date-typed field values.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Live-entity lookups needed by validation: object references must point at
/// a registered value, file references at an existing media file.
pub trait Lookups {
    fn has_object(&self, type_id: &str, value_id: &str) -> bool;
    fn has_media(&self, kind: MediaKind, file_name: &str) -> bool;
}

/// Lookups for contexts with no reference/media fields in play (tests,
/// default construction).
pub struct NoLookups;

impl Lookups for NoLookups {
    fn has_object(&self, _type_id: &str, _value_id: &str) -> bool {
        false
    }
    fn has_media(&self, _kind: MediaKind, _file_name: &str) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// StringType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StringType {
    default: String,
    min_length: usize,
    max_length: usize,
    one_of: Vec<String>,
}

impl Default for StringType {
    fn default() -> Self {
        Self {
            default: String::new(),
            min_length: 0,
            max_length: usize::MAX,
            one_of: Vec::new(),
        }
    }
}

impl StringType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn one_of(&self) -> &[String] {
        &self.one_of
    }

    /// Constraint setters refuse any bound that would invalidate the
    /// current default.
    pub fn set_min_length(&mut self, min_length: usize) -> Result<()> {
        if min_length > self.max_length || self.default.chars().count() < min_length {
            return Err(SigncastError::InvalidConstraint(format!(
                "min_length {min_length} excludes default '{}'",
                self.default
            )));
        }
        self.min_length = min_length;
        Ok(())
    }

    pub fn set_max_length(&mut self, max_length: usize) -> Result<()> {
        if max_length < self.min_length || self.default.chars().count() > max_length {
            return Err(SigncastError::InvalidConstraint(format!(
                "max_length {max_length} excludes default '{}'",
                self.default
            )));
        }
        self.max_length = max_length;
        Ok(())
    }

    pub fn set_one_of(&mut self, one_of: Vec<String>) -> Result<()> {
        if !one_of.is_empty() && !one_of.iter().any(|s| s == &self.default) {
            return Err(SigncastError::InvalidConstraint(format!(
                "one_of excludes default '{}'",
                self.default
            )));
        }
        self.one_of = one_of;
        Ok(())
    }

    pub fn set_default(&mut self, default: String) -> Result<()> {
        if !self.accepts(&default) {
            return Err(SigncastError::InvalidConstraint(format!(
                "default '{default}' violates string constraints"
            )));
        }
        self.default = default;
        Ok(())
    }

    fn accepts(&self, value: &str) -> bool {
        let len = value.chars().count();
        len >= self.min_length
            && len <= self.max_length
            && (self.one_of.is_empty() || self.one_of.iter().any(|s| s == value))
    }
}

// ---------------------------------------------------------------------------
// IntegerType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct IntegerType {
    default: i64,
    min: i64,
    max: i64,
    one_of: Vec<i64>,
}

impl Default for IntegerType {
    fn default() -> Self {
        Self {
            default: 0,
            min: 0,
            max: i64::MAX,
            one_of: Vec::new(),
        }
    }
}

impl IntegerType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(&self) -> i64 {
        self.default
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn one_of(&self) -> &[i64] {
        &self.one_of
    }

    pub fn set_min(&mut self, min: i64) -> Result<()> {
        if min > self.max || self.default < min {
            return Err(SigncastError::InvalidConstraint(format!(
                "min {min} excludes default {}",
                self.default
            )));
        }
        self.min = min;
        Ok(())
    }

    pub fn set_max(&mut self, max: i64) -> Result<()> {
        if max < self.min || self.default > max {
            return Err(SigncastError::InvalidConstraint(format!(
                "max {max} excludes default {}",
                self.default
            )));
        }
        self.max = max;
        Ok(())
    }

    pub fn set_one_of(&mut self, one_of: Vec<i64>) -> Result<()> {
        if !one_of.is_empty() && !one_of.contains(&self.default) {
            return Err(SigncastError::InvalidConstraint(format!(
                "one_of excludes default {}",
                self.default
            )));
        }
        self.one_of = one_of;
        Ok(())
    }

    pub fn set_default(&mut self, default: i64) -> Result<()> {
        if !self.accepts(default) {
            return Err(SigncastError::InvalidConstraint(format!(
                "default {default} violates integer constraints"
            )));
        }
        self.default = default;
        Ok(())
    }

    fn accepts(&self, value: i64) -> bool {
        value >= self.min
            && value <= self.max
            && (self.one_of.is_empty() || self.one_of.contains(&value))
    }
}

// ---------------------------------------------------------------------------
// DateType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DateType {
    default: NaiveDateTime,
    min: NaiveDateTime,
    max: NaiveDateTime,
}

fn datetime(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .unwrap_or_default()
}

impl Default for DateType {
    fn default() -> Self {
        let min = datetime(1, 1, 1, 0, 0, 0);
        Self {
            default: min,
            min,
            max: datetime(9999, 12, 31, 23, 59, 59),
        }
    }
}

impl DateType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_value(&self) -> NaiveDateTime {
        self.default
    }

    pub fn min(&self) -> NaiveDateTime {
        self.min
    }

    pub fn max(&self) -> NaiveDateTime {
        self.max
    }

    pub fn set_min(&mut self, min: NaiveDateTime) -> Result<()> {
        if min > self.max || self.default < min {
            return Err(SigncastError::InvalidConstraint(format!(
                "min {min} excludes default {}",
                self.default
            )));
        }
        self.min = min;
        Ok(())
    }

    pub fn set_max(&mut self, max: NaiveDateTime) -> Result<()> {
        if max < self.min || self.default > max {
            return Err(SigncastError::InvalidConstraint(format!(
                "max {max} excludes default {}",
                self.default
            )));
        }
        self.max = max;
        Ok(())
    }

    pub fn set_default(&mut self, default: NaiveDateTime) -> Result<()> {
        if default < self.min || default > self.max {
            return Err(SigncastError::InvalidConstraint(format!(
                "default {default} outside [{}, {}]",
                self.min, self.max
            )));
        }
        self.default = default;
        Ok(())
    }

    fn accepts(&self, value: &str) -> bool {
        match NaiveDateTime::parse_from_str(value, DATE_FORMAT) {
            Ok(dt) => dt >= self.min && dt <= self.max,
            Err(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// ListType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ListType {
    element: Box<DataType>,
    min_len: usize,
    max_len: usize,
}

impl ListType {
    pub fn new(element: DataType, min_len: usize, max_len: usize) -> Result<Self> {
        if min_len > max_len {
            return Err(SigncastError::InvalidConstraint(format!(
                "list bounds [{min_len},{max_len}] are inverted"
            )));
        }
        Ok(Self {
            element: Box::new(element),
            min_len,
            max_len,
        })
    }

    pub fn element(&self) -> &DataType {
        &self.element
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// Closed union of every field type the manifest grammar can express.
///
/// Object-typed fields hold the referenced type's id; the owning store
/// resolves it. Nothing here points back into a manager.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(StringType),
    Integer(IntegerType),
    Boolean,
    Date(DateType),
    List(ListType),
    File(MediaKind),
    Object { type_id: String },
}

impl DataType {
    pub fn default_value(&self) -> Value {
        match self {
            DataType::String(t) => Value::Str(t.default_value().to_string()),
            DataType::Integer(t) => Value::Int(t.default_value()),
            DataType::Boolean => Value::Bool(false),
            DataType::Date(t) => Value::Str(t.default_value().format(DATE_FORMAT).to_string()),
            DataType::List(t) => {
                Value::List(vec![t.element().default_value(); t.min_len()])
            }
            // Unset until the user picks a file / a referenced value.
            DataType::File(_) => Value::Null,
            DataType::Object { .. } => Value::Null,
        }
    }

    /// Validate a value against this type. List length bounds are deliberately
    /// not checked here; the field setter owns them.
    pub fn is_valid(&self, value: &Value, lookups: &dyn Lookups) -> bool {
        match (self, value) {
            (DataType::String(t), Value::Str(s)) => t.accepts(s),
            (DataType::Integer(t), Value::Int(i)) => t.accepts(*i),
            (DataType::Boolean, Value::Bool(_)) => true,
            (DataType::Date(t), Value::Str(s)) => t.accepts(s),
            (DataType::List(t), Value::List(items)) => {
                items.iter().all(|item| t.element().is_valid(item, lookups))
            }
            (DataType::File(_), Value::Null) => true,
            (DataType::File(kind), Value::Str(name)) => lookups.has_media(*kind, name),
            (DataType::Object { .. }, Value::Null) => true,
            (DataType::Object { type_id }, Value::Str(id)) => lookups.has_object(type_id, id),
            _ => false,
        }
    }

    /// The object type this type points at, if any (directly or as the
    /// element type of a list). Drives the type-level reference index.
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            DataType::Object { type_id } => Some(type_id),
            DataType::List(t) => t.element().referenced_type(),
            _ => None,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            DataType::String(_) => "str",
            DataType::Integer(_) => "int",
            DataType::Boolean => "bool",
            DataType::Date(_) => "datetime",
            DataType::List(_) => "list",
            DataType::File(MediaKind::Image) => "image",
            DataType::File(MediaKind::Video) => "video",
            DataType::Object { .. } => "object",
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor grammar
// ---------------------------------------------------------------------------

static LIST_RE: OnceLock<Regex> = OnceLock::new();

fn list_re() -> &'static Regex {
    LIST_RE.get_or_init(|| Regex::new(r"^\[(\d+),(\d+)\](.+)$").unwrap())
}

/// Parse a manifest field descriptor:
/// `str | int | bool | datetime | image | video | $<type_id> | [<min>,<max>]<descriptor>`
pub fn parse_descriptor(descriptor: &str) -> Result<DataType> {
    match descriptor {
        "str" => return Ok(DataType::String(StringType::new())),
        "int" => return Ok(DataType::Integer(IntegerType::new())),
        "bool" => return Ok(DataType::Boolean),
        "datetime" => return Ok(DataType::Date(DateType::new())),
        "image" => return Ok(DataType::File(MediaKind::Image)),
        "video" => return Ok(DataType::File(MediaKind::Video)),
        _ => {}
    }

    if let Some(type_id) = descriptor.strip_prefix('$') {
        paths::validate_id(type_id)
            .map_err(|_| SigncastError::InvalidDescriptor(descriptor.to_string()))?;
        return Ok(DataType::Object {
            type_id: type_id.to_string(),
        });
    }

    if let Some(caps) = list_re().captures(descriptor) {
        let min_len: usize = caps[1]
            .parse()
            .map_err(|_| SigncastError::InvalidDescriptor(descriptor.to_string()))?;
        let max_len: usize = caps[2]
            .parse()
            .map_err(|_| SigncastError::InvalidDescriptor(descriptor.to_string()))?;
        let element = parse_descriptor(&caps[3])?;
        return Ok(DataType::List(
            ListType::new(element, min_len, max_len)
                .map_err(|_| SigncastError::InvalidDescriptor(descriptor.to_string()))?,
        ));
    }

    Err(SigncastError::InvalidDescriptor(descriptor.to_string()))
}

// ---------------------------------------------------------------------------
// ObjectType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: String,
    pub label: String,
    pub description: String,
    pub data_type: DataType,
}

/// A named schema: ordered fields, each with a label, description and type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub id: String,
    pub name: String,
    pub dev_name: String,
    pub dev_homepage: String,
    pub description: String,
    pub fields: Vec<Field>,
}

impl ObjectType {
    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    /// True if any field (directly or as a list element) points at `type_id`.
    pub fn has_references(&self, type_id: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.data_type.referenced_type() == Some(type_id))
    }

    /// Every distinct type id this schema depends on.
    pub fn referenced_types(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .fields
            .iter()
            .filter_map(|f| f.data_type.referenced_type())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

// ---------------------------------------------------------------------------
// Manifest parsing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ManifestDoc {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dev_name: String,
    #[serde(default)]
    dev_homepage: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl ObjectType {
    /// Parse a `manifest.json` document. `origin` is only used in error
    /// messages. Field order in the document is preserved.
    pub fn parse_manifest(type_id: &str, data: &str, origin: &str) -> Result<Self> {
        let doc: ManifestDoc = serde_json::from_str(data).map_err(|e| SigncastError::Manifest {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;

        let mut fields = Vec::with_capacity(doc.fields.len());
        for (field_id, entry) in &doc.fields {
            paths::validate_id(field_id)?;
            let parts = entry
                .as_array()
                .filter(|a| a.len() == 3)
                .ok_or_else(|| SigncastError::Manifest {
                    path: origin.to_string(),
                    reason: format!("field '{field_id}' must be [label, description, descriptor]"),
                })?;
            let part = |i: usize| -> Result<&str> {
                parts[i].as_str().ok_or_else(|| SigncastError::Manifest {
                    path: origin.to_string(),
                    reason: format!("field '{field_id}' entry {i} must be a string"),
                })
            };
            fields.push(Field {
                id: field_id.clone(),
                label: part(0)?.to_string(),
                description: part(1)?.to_string(),
                data_type: parse_descriptor(part(2)?)?,
            });
        }

        Ok(ObjectType {
            id: type_id.to_string(),
            name: doc.name,
            dev_name: doc.dev_name,
            dev_homepage: doc.dev_homepage,
            description: doc.description,
            fields,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn types_under_test() -> Vec<DataType> {
        vec![
            DataType::String(StringType::new()),
            DataType::Integer(IntegerType::new()),
            DataType::Boolean,
            DataType::Date(DateType::new()),
            DataType::List(ListType::new(DataType::Integer(IntegerType::new()), 2, 5).unwrap()),
            DataType::File(MediaKind::Image),
            DataType::Object {
                type_id: "menu_item".into(),
            },
        ]
    }

    #[test]
    fn default_is_valid_for_every_variant() {
        for dt in types_under_test() {
            let default = dt.default_value();
            assert!(
                dt.is_valid(&default, &NoLookups),
                "default {default:?} invalid for {}",
                dt.kind_str()
            );
        }
    }

    #[test]
    fn string_constraints() {
        let mut t = StringType::new();
        t.set_min_length(2).unwrap_err(); // default "" would be stranded
        t.set_default("ab".into()).unwrap();
        t.set_min_length(2).unwrap();
        t.set_max_length(1).unwrap_err();
        t.set_one_of(vec!["xy".into()]).unwrap_err();
        t.set_one_of(vec!["ab".into(), "cd".into()]).unwrap();

        let dt = DataType::String(t);
        assert!(dt.is_valid(&Value::Str("cd".into()), &NoLookups));
        assert!(!dt.is_valid(&Value::Str("zz".into()), &NoLookups));
        assert!(!dt.is_valid(&Value::Int(3), &NoLookups));
    }

    #[test]
    fn integer_bounds() {
        let mut t = IntegerType::new();
        t.set_max(100).unwrap();
        t.set_min(101).unwrap_err();
        let dt = DataType::Integer(t);
        assert!(dt.is_valid(&Value::Int(0), &NoLookups));
        assert!(dt.is_valid(&Value::Int(100), &NoLookups));
        assert!(!dt.is_valid(&Value::Int(-1), &NoLookups));
        assert!(!dt.is_valid(&Value::Int(101), &NoLookups));
    }

    #[test]
    fn date_parses_fixed_format() {
        let dt = DataType::Date(DateType::new());
        assert!(dt.is_valid(&Value::Str("2018-03-01 09:30:00".into()), &NoLookups));
        assert!(!dt.is_valid(&Value::Str("03/01/2018".into()), &NoLookups));
        assert!(!dt.is_valid(&Value::Str("not a date".into()), &NoLookups));
    }

    #[test]
    fn list_validates_elements_not_length() {
        let dt = DataType::List(
            ListType::new(DataType::Integer(IntegerType::new()), 0, 2).unwrap(),
        );
        // Three valid elements: over max_len, but is_valid leaves length to
        // the field setter.
        let v = Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(dt.is_valid(&v, &NoLookups));
        let bad = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert!(!dt.is_valid(&bad, &NoLookups));
    }

    #[test]
    fn descriptor_grammar() {
        assert!(matches!(parse_descriptor("str").unwrap(), DataType::String(_)));
        assert!(matches!(parse_descriptor("int").unwrap(), DataType::Integer(_)));
        assert_eq!(parse_descriptor("bool").unwrap(), DataType::Boolean);
        assert!(matches!(parse_descriptor("datetime").unwrap(), DataType::Date(_)));
        assert_eq!(
            parse_descriptor("image").unwrap(),
            DataType::File(MediaKind::Image)
        );
        assert_eq!(
            parse_descriptor("$menu_item").unwrap(),
            DataType::Object {
                type_id: "menu_item".into()
            }
        );

        let list = parse_descriptor("[0,50]$menu_item").unwrap();
        match &list {
            DataType::List(t) => {
                assert_eq!(t.min_len(), 0);
                assert_eq!(t.max_len(), 50);
                assert_eq!(t.element().referenced_type(), Some("menu_item"));
            }
            other => panic!("expected list, got {other:?}"),
        }
        assert_eq!(list.referenced_type(), Some("menu_item"));

        for bad in ["", "float", "$Bad-Id", "[5,2]int", "[0,10]", "[a,b]str"] {
            assert!(parse_descriptor(bad).is_err(), "expected invalid: {bad}");
        }
    }

    #[test]
    fn nested_list_descriptor() {
        let dt = parse_descriptor("[1,3][0,2]str").unwrap();
        match dt {
            DataType::List(outer) => match outer.element() {
                DataType::List(inner) => {
                    assert!(matches!(inner.element(), DataType::String(_)))
                }
                other => panic!("expected inner list, got {other:?}"),
            },
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn manifest_parse_preserves_field_order() {
        let manifest = r#"{
            "name": "Menu item",
            "dev_name": "example",
            "dev_homepage": "https://example.com",
            "description": "A sellable item",
            "fields": {
                "name": ["Name", "Item name", "str"],
                "price": ["Price", "Price in cents", "int"],
                "available": ["Available", "In stock", "bool"]
            }
        }"#;
        let ty = ObjectType::parse_manifest("menu_item", manifest, "test").unwrap();
        assert_eq!(ty.name, "Menu item");
        let ids: Vec<&str> = ty.fields.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, ["name", "price", "available"]);
    }

    #[test]
    fn manifest_rejects_malformed_field_entry() {
        let manifest = r#"{"fields": {"price": ["Price", "int"]}}"#;
        assert!(ObjectType::parse_manifest("menu_item", manifest, "test").is_err());
    }

    #[test]
    fn has_references_sees_list_elements() {
        let manifest = r#"{
            "fields": {
                "items": ["Items", "", "[0,50]$menu_item"],
                "name": ["Name", "", "str"]
            }
        }"#;
        let ty = ObjectType::parse_manifest("menu_group", manifest, "test").unwrap();
        assert!(ty.has_references("menu_item"));
        assert!(!ty.has_references("menu_group"));
        assert_eq!(ty.referenced_types(), ["menu_item"]);
    }
}
