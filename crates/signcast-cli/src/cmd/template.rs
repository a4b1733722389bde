use crate::output::{print_json, print_table};
use clap::Subcommand;
use serde_json::json;
use signcast_core::template::{Template, TemplateKind};
use std::path::Path;

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// List scene and frame templates
    List,
    /// Show a template's fields
    Show {
        #[arg(value_enum)]
        kind: TemplateKindArg,
        template_id: String,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum TemplateKindArg {
    Scene,
    Frame,
}

impl From<TemplateKindArg> for TemplateKind {
    fn from(arg: TemplateKindArg) -> Self {
        match arg {
            TemplateKindArg::Scene => TemplateKind::Scene,
            TemplateKindArg::Frame => TemplateKind::Frame,
        }
    }
}

pub fn run(root: &Path, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    let store = super::load_store(root)?;
    match subcmd {
        TemplateSubcommand::List => {
            let all: Vec<&Template> = store
                .templates()
                .scene_templates()
                .chain(store.templates().frame_templates())
                .collect();
            if json {
                let list: Vec<_> = all
                    .iter()
                    .map(|t| {
                        json!({
                            "id": t.id,
                            "kind": t.kind.as_str(),
                            "name": t.definition.name,
                            "fields": t.definition.fields.len(),
                        })
                    })
                    .collect();
                print_json(&list)
            } else {
                let rows = all
                    .iter()
                    .map(|t| {
                        vec![
                            t.id.clone(),
                            t.kind.as_str().to_string(),
                            t.definition.name.clone(),
                            t.definition.fields.len().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "KIND", "NAME", "FIELDS"], rows);
                Ok(())
            }
        }
        TemplateSubcommand::Show { kind, template_id } => {
            let kind = TemplateKind::from(kind);
            let template = match kind {
                TemplateKind::Scene => store.templates().get_scene_template(&template_id)?,
                TemplateKind::Frame => store.templates().get_frame_template(&template_id)?,
            };
            let used_by = store.signages().template_references(kind, &template_id);
            let def = &template.definition;
            if json {
                let fields: Vec<_> = def
                    .fields
                    .iter()
                    .map(|f| {
                        json!({
                            "id": f.id,
                            "label": f.label,
                            "description": f.description,
                            "type": f.data_type.kind_str(),
                        })
                    })
                    .collect();
                print_json(&json!({
                    "id": template.id,
                    "kind": template.kind.as_str(),
                    "name": def.name,
                    "description": def.description,
                    "fields": fields,
                    "used_by": used_by,
                }))
            } else {
                println!("{} ({})", template.id, def.name);
                if !def.description.is_empty() {
                    println!("  {}", def.description);
                }
                let rows = def
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
                print_table(&["FIELD", "LABEL", "TYPE"], rows);
                if !used_by.is_empty() {
                    println!("used by: {}", used_by.keys().cloned().collect::<Vec<_>>().join(", "));
                }
                Ok(())
            }
        }
    }
}
