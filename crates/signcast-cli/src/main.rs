mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    channel::ChannelSubcommand, media::MediaSubcommand, object::ObjectSubcommand,
    signage::SignageSubcommand, template::TemplateSubcommand, typecmd::TypeSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "signcast",
    about = "Typed digital-signage content store: manage objects, signages, and channels",
    version,
    propagate_version = true
)]
struct Cli {
    /// Content root (default: auto-detect from signcast.json)
    #[arg(long, global = true, env = "SIGNCAST_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a content root in the current directory
    Init,

    /// Inspect object types
    Type {
        #[command(subcommand)]
        subcommand: TypeSubcommand,
    },

    /// Manage object values
    Object {
        #[command(subcommand)]
        subcommand: ObjectSubcommand,
    },

    /// Inspect scene and frame templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Manage signages and their scenes
    Signage {
        #[command(subcommand)]
        subcommand: SignageSubcommand,
    },

    /// Manage display channels
    Channel {
        #[command(subcommand)]
        subcommand: ChannelSubcommand,
    },

    /// Inspect media files
    Media {
        #[command(subcommand)]
        subcommand: MediaSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Type { subcommand } => cmd::typecmd::run(&root, subcommand, cli.json),
        Commands::Object { subcommand } => cmd::object::run(&root, subcommand, cli.json),
        Commands::Template { subcommand } => cmd::template::run(&root, subcommand, cli.json),
        Commands::Signage { subcommand } => cmd::signage::run(&root, subcommand, cli.json),
        Commands::Channel { subcommand } => cmd::channel::run(&root, subcommand, cli.json),
        Commands::Media { subcommand } => cmd::media::run(&root, subcommand, cli.json),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
