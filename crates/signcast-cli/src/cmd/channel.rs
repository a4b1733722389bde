use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use std::path::Path;

#[derive(Subcommand)]
pub enum ChannelSubcommand {
    /// List all channels
    List,
    /// Create a channel bound to a signage
    Create {
        channel_id: String,
        #[arg(long)]
        signage: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Rebind a channel to another signage
    SetSignage {
        channel_id: String,
        signage_id: String,
    },
    /// Update a channel's description
    SetDescription {
        channel_id: String,
        description: String,
    },
    /// Rename a channel, redirecting its displays
    Rename { old_id: String, new_id: String },
    /// Delete a channel
    Remove { channel_id: String },
}

pub fn run(root: &Path, subcmd: ChannelSubcommand, json: bool) -> anyhow::Result<()> {
    let mut store = super::load_store(root)?;
    match subcmd {
        ChannelSubcommand::List => {
            if json {
                let list: Vec<_> = store
                    .channels()
                    .channels()
                    .map(|c| {
                        json!({
                            "id": c.id(),
                            "signage": c.signage_id(),
                            "description": c.description,
                        })
                    })
                    .collect();
                print_json(&list)
            } else {
                let rows = store
                    .channels()
                    .channels()
                    .map(|c| {
                        vec![
                            c.id().to_string(),
                            c.signage_id().to_string(),
                            c.description.clone(),
                        ]
                    })
                    .collect();
                print_table(&["ID", "SIGNAGE", "DESCRIPTION"], rows);
                Ok(())
            }
        }
        ChannelSubcommand::Create {
            channel_id,
            signage,
            description,
        } => {
            store
                .create_channel(&channel_id, &description, &signage)
                .with_context(|| format!("failed to create channel '{channel_id}'"))?;
            println!("created channel '{channel_id}' -> '{signage}'");
            Ok(())
        }
        ChannelSubcommand::SetSignage {
            channel_id,
            signage_id,
        } => {
            store
                .set_channel_signage(&channel_id, &signage_id)
                .with_context(|| format!("failed to rebind channel '{channel_id}'"))?;
            println!("channel '{channel_id}' -> '{signage_id}'");
            Ok(())
        }
        ChannelSubcommand::SetDescription {
            channel_id,
            description,
        } => {
            store.set_channel_description(&channel_id, &description)?;
            println!("updated channel '{channel_id}'");
            Ok(())
        }
        ChannelSubcommand::Rename { old_id, new_id } => {
            store
                .rename_channel(&old_id, &new_id)
                .with_context(|| format!("failed to rename channel '{old_id}'"))?;
            println!("renamed channel '{old_id}' -> '{new_id}'");
            Ok(())
        }
        ChannelSubcommand::Remove { channel_id } => {
            store.remove_channel(&channel_id)?;
            println!("removed channel '{channel_id}'");
            Ok(())
        }
    }
}
