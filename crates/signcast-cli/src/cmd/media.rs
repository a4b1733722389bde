use crate::output::{print_json, print_table};
use clap::Subcommand;
use signcast_core::datatype::MediaKind;
use std::path::Path;

#[derive(Subcommand)]
pub enum MediaSubcommand {
    /// List media files of a kind
    List {
        #[arg(value_enum)]
        kind: MediaKindArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum MediaKindArg {
    Image,
    Video,
}

impl From<MediaKindArg> for MediaKind {
    fn from(arg: MediaKindArg) -> Self {
        match arg {
            MediaKindArg::Image => MediaKind::Image,
            MediaKindArg::Video => MediaKind::Video,
        }
    }
}

pub fn run(root: &Path, subcmd: MediaSubcommand, json: bool) -> anyhow::Result<()> {
    let store = super::load_store(root)?;
    match subcmd {
        MediaSubcommand::List { kind } => {
            let kind = MediaKind::from(kind);
            let files = store.media().list(kind)?;
            if json {
                print_json(&files)
            } else {
                let rows = files.into_iter().map(|f| vec![f]).collect();
                print_table(&[kind.as_str().to_uppercase().as_str()], rows);
                Ok(())
            }
        }
    }
}
