//! Config command - show or initialize the configuration file.

use datumkit_core::Config;
use std::path::Path;

/// Run the config command.
pub fn run(config: Config, path: &Path, init: bool) -> anyhow::Result<()> {
    if init {
        if path.exists() {
            println!("Configuration already exists at {}", path.display());
        } else {
            Config::default().save_to(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        return Ok(());
    }

    println!("# {}", path.display());
    println!("# store root: {}", config.store_root()?.display());
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
