use std::collections::BTreeMap;
use thiserror::Error;

/// Referrer map attached to reference errors, keyed by blocking path with a
/// human-readable detail, e.g. `"object/menu_group.drinks": "field 'items'"`.
pub type ReferenceMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum SigncastError {
    #[error("invalid id '{0}': must match [a-z][a-z0-9_]*, max 64 chars")]
    InvalidId(String),

    #[error("id already exists: {0}")]
    IdExists(String),

    #[error("invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown field '{field}' on type '{type_id}'")]
    UnknownField { type_id: String, field: String },

    #[error("invalid constraint on data type: {0}")]
    InvalidConstraint(String),

    #[error("invalid duration {0}: must be >= 0")]
    NegativeDuration(i64),

    #[error("invalid type descriptor '{0}'")]
    InvalidDescriptor(String),

    #[error("object type not found: {0}")]
    TypeNotFound(String),

    #[error("object value not found: {type_id}/{value_id}")]
    ValueNotFound { type_id: String, value_id: String },

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("signage not found: {0}")]
    SignageNotFound(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("scene index {index} out of range for signage '{signage_id}'")]
    SceneOutOfRange { signage_id: String, index: usize },

    #[error("cannot remove '{target}': referenced by {}", format_referrers(.referrers))]
    ReferencesExist {
        target: String,
        referrers: ReferenceMap,
    },

    #[error("unresolved type references after load: {}", .0.join(", "))]
    UnresolvedTypes(Vec<String>),

    #[error("malformed manifest at {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_referrers(referrers: &ReferenceMap) -> String {
    referrers
        .iter()
        .map(|(path, detail)| format!("{path} ({detail})"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SigncastError>;
