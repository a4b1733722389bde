use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::NaiveTime;
use clap::Subcommand;
use serde_json::json;
use signcast_core::schedule::{Schedule, Visibility, EVERY_DAY};
use signcast_core::signage::Transition;
use std::path::Path;

#[derive(Subcommand)]
pub enum SignageSubcommand {
    /// List all signages
    List,
    /// Show one signage's frame and scenes
    Show { signage_id: String },
    /// Create a signage with an empty scene list
    Create {
        signage_id: String,
        /// Frame template id
        #[arg(long)]
        frame: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Update title / description
    Update {
        signage_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Append a scene using the given scene template
    AddScene {
        signage_id: String,
        template_id: String,
    },
    /// Remove the scene at a position
    RemoveScene { signage_id: String, index: usize },
    /// Swap the scenes at two positions
    Rearrange {
        signage_id: String,
        a: usize,
        b: usize,
    },
    /// Set a scene's duration in seconds
    SetDuration {
        signage_id: String,
        index: usize,
        duration: i64,
    },
    /// Set a scene's transition (none | push | fade)
    SetTransition {
        signage_id: String,
        index: usize,
        transition: Transition,
    },
    /// Set a scene's visibility schedule
    SetSchedule {
        signage_id: String,
        index: usize,
        /// always_visible | always_hidden | visible_on_time | hidden_on_time
        #[arg(long, default_value = "always_visible")]
        visibility: String,
        /// Window start, HH:MM
        #[arg(long, default_value = "00:00")]
        from: String,
        /// Window end (exclusive), HH:MM
        #[arg(long, default_value = "00:00")]
        to: String,
        /// Day-of-week bitmask, bit 0 = Monday (127 = every day)
        #[arg(long, default_value_t = EVERY_DAY)]
        days: u8,
    },
    /// Replace a scene's template, resetting its data
    SetTemplate {
        signage_id: String,
        index: usize,
        template_id: String,
    },
    /// Set one field of a scene's data
    SetField {
        signage_id: String,
        index: usize,
        field: String,
        value: String,
    },
    /// Set one field of the frame's data
    SetFrameField {
        signage_id: String,
        field: String,
        value: String,
    },
    /// Rename a signage, rebinding its channels
    Rename { old_id: String, new_id: String },
    /// Delete a signage (refused while a channel is bound to it)
    Remove { signage_id: String },
}

fn parse_schedule(visibility: &str, from: &str, to: &str, days: u8) -> anyhow::Result<Schedule> {
    let visibility = match visibility {
        "always_visible" => Visibility::AlwaysVisible,
        "always_hidden" => Visibility::AlwaysHidden,
        "visible_on_time" => Visibility::VisibleOnTime,
        "hidden_on_time" => Visibility::HiddenOnTime,
        other => anyhow::bail!("unknown visibility '{other}'"),
    };
    let from = NaiveTime::parse_from_str(from, "%H:%M").context("bad --from, expected HH:MM")?;
    let to = NaiveTime::parse_from_str(to, "%H:%M").context("bad --to, expected HH:MM")?;
    Ok(Schedule::new(visibility, from, to, days))
}

pub fn run(root: &Path, subcmd: SignageSubcommand, json: bool) -> anyhow::Result<()> {
    let mut store = super::load_store(root)?;
    match subcmd {
        SignageSubcommand::List => {
            if json {
                let list: Vec<_> = store
                    .signages()
                    .signages()
                    .map(|s| json!({"id": s.id(), "title": s.title, "scenes": s.scenes().len()}))
                    .collect();
                print_json(&list)
            } else {
                let rows = store
                    .signages()
                    .signages()
                    .map(|s| {
                        vec![
                            s.id().to_string(),
                            s.title.clone(),
                            s.scenes().len().to_string(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "TITLE", "SCENES"], rows);
                Ok(())
            }
        }
        SignageSubcommand::Show { signage_id } => {
            let signage = store.signages().get_signage(&signage_id)?;
            let scenes: Vec<_> = signage
                .scenes()
                .iter()
                .map(|scene| {
                    json!({
                        "template": scene.template_id(),
                        "duration": scene.duration(),
                        "transition": scene.transition().as_str(),
                        "visibility": scene.schedule().visibility.as_str(),
                    })
                })
                .collect();
            print_json(&json!({
                "id": signage.id(),
                "title": signage.title,
                "description": signage.description,
                "frame": signage.frame().template_id(),
                "scenes": scenes,
            }))
        }
        SignageSubcommand::Create {
            signage_id,
            frame,
            title,
            description,
        } => {
            store
                .create_signage(&signage_id, &title, &description, &frame)
                .with_context(|| format!("failed to create signage '{signage_id}'"))?;
            println!("created signage '{signage_id}'");
            Ok(())
        }
        SignageSubcommand::Update {
            signage_id,
            title,
            description,
        } => {
            if let Some(title) = title {
                store.set_signage_title(&signage_id, &title)?;
            }
            if let Some(description) = description {
                store.set_signage_description(&signage_id, &description)?;
            }
            println!("updated signage '{signage_id}'");
            Ok(())
        }
        SignageSubcommand::AddScene {
            signage_id,
            template_id,
        } => {
            store.add_scene(&signage_id, &template_id)?;
            println!("added scene '{template_id}' to '{signage_id}'");
            Ok(())
        }
        SignageSubcommand::RemoveScene { signage_id, index } => {
            store.remove_scene(&signage_id, index)?;
            println!("removed scene {index} from '{signage_id}'");
            Ok(())
        }
        SignageSubcommand::Rearrange { signage_id, a, b } => {
            store.rearrange_scene(&signage_id, a, b)?;
            println!("swapped scenes {a} and {b} in '{signage_id}'");
            Ok(())
        }
        SignageSubcommand::SetDuration {
            signage_id,
            index,
            duration,
        } => {
            store.set_scene_duration(&signage_id, index, duration)?;
            println!("scene {index} duration = {duration}s");
            Ok(())
        }
        SignageSubcommand::SetTransition {
            signage_id,
            index,
            transition,
        } => {
            store.set_scene_transition(&signage_id, index, transition)?;
            println!("scene {index} transition = {transition}");
            Ok(())
        }
        SignageSubcommand::SetSchedule {
            signage_id,
            index,
            visibility,
            from,
            to,
            days,
        } => {
            let schedule = parse_schedule(&visibility, &from, &to, days)?;
            store.set_scene_schedule(&signage_id, index, schedule)?;
            println!("scene {index} schedule updated");
            Ok(())
        }
        SignageSubcommand::SetTemplate {
            signage_id,
            index,
            template_id,
        } => {
            store.set_scene_template(&signage_id, index, &template_id)?;
            println!("scene {index} template = '{template_id}' (data reset)");
            Ok(())
        }
        SignageSubcommand::SetField {
            signage_id,
            index,
            field,
            value,
        } => {
            let parsed = super::parse_value(&value);
            store
                .set_scene_field(&signage_id, index, &field, parsed)
                .with_context(|| format!("failed to set scene {index} field '{field}'"))?;
            println!("set scene {index} field '{field}'");
            Ok(())
        }
        SignageSubcommand::SetFrameField {
            signage_id,
            field,
            value,
        } => {
            let parsed = super::parse_value(&value);
            store
                .set_frame_field(&signage_id, &field, parsed)
                .with_context(|| format!("failed to set frame field '{field}'"))?;
            println!("set frame field '{field}'");
            Ok(())
        }
        SignageSubcommand::Rename { old_id, new_id } => {
            store
                .rename_signage(&old_id, &new_id)
                .with_context(|| format!("failed to rename signage '{old_id}'"))?;
            println!("renamed signage '{old_id}' -> '{new_id}'");
            Ok(())
        }
        SignageSubcommand::Remove { signage_id } => {
            store
                .remove_signage(&signage_id)
                .with_context(|| format!("failed to remove signage '{signage_id}'"))?;
            println!("removed signage '{signage_id}'");
            Ok(())
        }
    }
}
