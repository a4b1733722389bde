use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand)]
pub enum TypeSubcommand {
    /// List all loaded object types
    List,
    /// Show one type's fields
    Show { type_id: String },
    /// Delete a type (refused while schemas, templates, or values depend on it)
    Remove { type_id: String },
}

pub fn run(root: &Path, subcmd: TypeSubcommand, json: bool) -> anyhow::Result<()> {
    let mut store = super::load_store(root)?;
    match subcmd {
        TypeSubcommand::List => {
            if json {
                let types: Vec<_> = store
                    .objects()
                    .types()
                    .map(|t| json!({"id": t.id, "name": t.name, "fields": t.fields.len()}))
                    .collect();
                print_json(&types)
            } else {
                let rows = store
                    .objects()
                    .types()
                    .map(|t| vec![t.id.clone(), t.name.clone(), t.fields.len().to_string()])
                    .collect();
                print_table(&["ID", "NAME", "FIELDS"], rows);
                Ok(())
            }
        }
        TypeSubcommand::Show { type_id } => {
            let ty = store.objects().get_type(&type_id)?;
            if json {
                let fields: Vec<_> = ty
                    .fields
                    .iter()
                    .map(|f| json!({"id": f.id, "label": f.label, "kind": f.data_type.kind_str()}))
                    .collect();
                print_json(&json!({
                    "id": ty.id,
                    "name": ty.name,
                    "description": ty.description,
                    "fields": fields,
                }))
            } else {
                println!("{} ({})", ty.id, ty.name);
                let rows = ty
                    .fields
                    .iter()
                    .map(|f| {
                        vec![
                            f.id.clone(),
                            f.label.clone(),
                            f.data_type.kind_str().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["FIELD", "LABEL", "KIND"], rows);
                Ok(())
            }
        }
        TypeSubcommand::Remove { type_id } => {
            store
                .remove_object_type(&type_id)
                .with_context(|| format!("failed to remove type '{type_id}'"))?;
            println!("removed type '{type_id}'");
            Ok(())
        }
    }
}
