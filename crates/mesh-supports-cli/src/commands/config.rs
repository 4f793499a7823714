//! mesh-supports config command - print a preset as a JSON configuration.

use anyhow::{Context, Result};
use mesh_supports::SupportConfig;

use crate::{Cli, Preset};

/// Resolve a preset to its configuration.
pub fn preset_config(preset: Preset) -> SupportConfig {
    match preset {
        Preset::Default => SupportConfig::default(),
        Preset::Fast => SupportConfig::preset_fast(),
        Preset::Sla => SupportConfig::preset_sla(),
    }
}

pub fn run(preset: Preset, cli: &Cli) -> Result<()> {
    let config = preset_config(preset);
    let json = config
        .to_json()
        .context("Failed to serialize configuration")?;

    // The configuration is JSON in either output format.
    if !cli.quiet {
        println!("{}", json);
    }
    Ok(())
}
