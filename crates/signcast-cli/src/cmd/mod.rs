pub mod channel;
pub mod init;
pub mod media;
pub mod object;
pub mod signage;
pub mod template;
pub mod typecmd;

use anyhow::Context;
use signcast_core::value::Value;
use signcast_core::ContentStore;
use std::path::Path;

pub fn load_store(root: &Path) -> anyhow::Result<ContentStore> {
    ContentStore::load(root)
        .with_context(|| format!("failed to load content root at {}", root.display()))
}

/// Field values on the command line are JSON when they parse as JSON
/// (`299`, `true`, `null`, `["milk"]`) and plain strings otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::Str(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_json_and_plain() {
        assert_eq!(parse_value("299"), Value::Int(299));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(
            parse_value(r#"["milk"]"#),
            Value::List(vec![Value::Str("milk".into())])
        );
        assert_eq!(parse_value("Drinks"), Value::Str("Drinks".into()));
        // Quoted JSON strings lose their quotes.
        assert_eq!(parse_value(r#""drinks""#), Value::Str("drinks".into()));
    }
}
