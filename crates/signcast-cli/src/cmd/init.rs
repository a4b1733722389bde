use anyhow::Context;
use signcast_core::ContentStore;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let config = ContentStore::init(root)
        .with_context(|| format!("failed to initialize {}", root.display()))?;
    println!("initialized content root at {}", root.display());
    println!("  data:      {}", config.data_dir);
    println!("  templates: {}", config.template_dir);
    println!("  signage:   {}", config.signage_dir);
    println!("  channels:  {}", config.channel_dir);
    Ok(())
}
