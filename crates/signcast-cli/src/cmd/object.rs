use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand)]
pub enum ObjectSubcommand {
    /// List the values of a type
    List { type_id: String },
    /// Show one value's fields
    Show { type_id: String, value_id: String },
    /// Create a default-initialized value
    Create { type_id: String, value_id: String },
    /// Set one field (value is JSON, or a plain string)
    Set {
        type_id: String,
        value_id: String,
        field: String,
        value: String,
    },
    /// Rename a value, updating every referrer
    Rename {
        type_id: String,
        old_id: String,
        new_id: String,
    },
    /// Delete a value (refused while anything references it)
    Remove { type_id: String, value_id: String },
    /// Show everything that references a value
    Refs { type_id: String, value_id: String },
}

pub fn run(root: &Path, subcmd: ObjectSubcommand, json: bool) -> anyhow::Result<()> {
    let mut store = super::load_store(root)?;
    match subcmd {
        ObjectSubcommand::List { type_id } => {
            let values = store.objects().get_values(&type_id)?;
            if json {
                let ids: Vec<&str> = values.iter().map(|v| v.id()).collect();
                print_json(&ids)
            } else {
                let rows = values.iter().map(|v| vec![v.id().to_string()]).collect();
                print_table(&["ID"], rows);
                Ok(())
            }
        }
        ObjectSubcommand::Show { type_id, value_id } => {
            let ty = store.objects().get_type(&type_id)?;
            let value = store.objects().get_value(&type_id, &value_id)?;
            print_json(&serde_json::Value::Object(value.snapshot(ty)))
        }
        ObjectSubcommand::Create { type_id, value_id } => {
            store
                .create_object_value(&type_id, &value_id)
                .with_context(|| format!("failed to create {type_id}/{value_id}"))?;
            println!("created {type_id}/{value_id}");
            Ok(())
        }
        ObjectSubcommand::Set {
            type_id,
            value_id,
            field,
            value,
        } => {
            let parsed = super::parse_value(&value);
            store
                .set_object_field(&type_id, &value_id, &field, parsed)
                .with_context(|| format!("failed to set {type_id}/{value_id}.{field}"))?;
            println!("set {type_id}/{value_id}.{field}");
            Ok(())
        }
        ObjectSubcommand::Rename {
            type_id,
            old_id,
            new_id,
        } => {
            store
                .rename_object_value(&type_id, &old_id, &new_id)
                .with_context(|| format!("failed to rename {type_id}/{old_id}"))?;
            println!("renamed {type_id}/{old_id} -> {new_id}");
            Ok(())
        }
        ObjectSubcommand::Remove { type_id, value_id } => {
            store
                .remove_object_value(&type_id, &value_id)
                .with_context(|| format!("failed to remove {type_id}/{value_id}"))?;
            println!("removed {type_id}/{value_id}");
            Ok(())
        }
        ObjectSubcommand::Refs { type_id, value_id } => {
            store.objects().get_value(&type_id, &value_id)?;
            let referrers = store.object_value_references(&type_id, &value_id);
            if json {
                print_json(&json!(referrers))
            } else if referrers.is_empty() {
                println!("no references to {type_id}/{value_id}");
                Ok(())
            } else {
                let rows = referrers
                    .into_iter()
                    .map(|(path, detail)| vec![path, detail])
                    .collect();
                print_table(&["REFERRER", "DETAIL"], rows);
                Ok(())
            }
        }
    }
}
