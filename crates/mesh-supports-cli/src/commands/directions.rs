//! mesh-supports directions command - inspect the probing cone.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mesh_supports::{DirectionSet, save_stl};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct DirectionInfo {
    dir: [f64; 3],
    weight: f64,
}

#[derive(Serialize)]
struct DirectionsOutput {
    cone_angle: f64,
    requested: usize,
    directions: Vec<DirectionInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported_to: Option<String>,
}

pub fn run(cone_angle: f64, count: usize, export: Option<&Path>, cli: &Cli) -> Result<()> {
    if !(cone_angle > 1.0 && cone_angle < 180.0) {
        bail!("cone angle must lie between 1 and 180 degrees, got {}", cone_angle);
    }

    let set = DirectionSet::fibonacci(cone_angle, count);

    if let Some(path) = export {
        save_stl(&set.to_mesh(), path)
            .with_context(|| format!("Failed to export directions to {:?}", path))?;
    }

    let result = DirectionsOutput {
        cone_angle,
        requested: count,
        directions: set
            .iter()
            .map(|d| DirectionInfo {
                dir: [d.dir.x, d.dir.y, d.dir.z],
                weight: d.weight,
            })
            .collect(),
        exported_to: export.map(|p| p.display().to_string()),
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Probing Directions".bold().underline());
                println!(
                    "  {}: {} of {} requested within {:.1}°",
                    "Directions".cyan(),
                    set.len(),
                    count,
                    cone_angle
                );
                for (i, d) in result.directions.iter().enumerate() {
                    println!(
                        "  {:>4}  ({:>7.4}, {:>7.4}, {:>7.4})  w={:.4}",
                        i, d.dir[0], d.dir[1], d.dir[2], d.weight
                    );
                }
                if let Some(ref path) = result.exported_to {
                    println!("  {}: {}", "Exported".green(), path);
                }
            }
        }
    }

    Ok(())
}
