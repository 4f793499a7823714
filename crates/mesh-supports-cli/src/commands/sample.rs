//! mesh-supports sample command - place support points on thin regions.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_supports::{Mesh, PointGrid, SupportConfig, SupportReport, generate_supports};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::info;

use crate::commands::config::preset_config;
use crate::{Cli, OutputFormat, Preset, output};

#[derive(Serialize)]
struct SupportPoint {
    position: [f64; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
}

#[derive(Serialize)]
struct SampleStats {
    preprocessed_triangles: usize,
    preprocessed_vertices: usize,
    directions: usize,
    vertices_probed: usize,
    vertices_measured: usize,
    candidates_generated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    width_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width_mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    width_max: Option<f64>,
}

#[derive(Serialize)]
struct SampleOutput {
    input: String,
    seed: u64,
    points: Vec<SupportPoint>,
    stats: SampleStats,
}

impl SampleOutput {
    fn from_report(input: &Path, seed: u64, report: &SupportReport, positions_only: bool) -> Self {
        let measured = report.width_stats.measured > 0;
        Self {
            input: input.display().to_string(),
            seed,
            points: report
                .points
                .iter()
                .map(|p| SupportPoint {
                    position: [p.position.x, p.position.y, p.position.z],
                    radius: (!positions_only).then_some(p.radius),
                })
                .collect(),
            stats: SampleStats {
                preprocessed_triangles: report.preprocessed_triangles,
                preprocessed_vertices: report.preprocessed_vertices,
                directions: report.directions,
                vertices_probed: report.vertices_probed,
                vertices_measured: report.vertices_measured,
                candidates_generated: report.candidates_generated,
                width_min: measured.then_some(report.width_stats.min),
                width_mean: measured.then_some(report.width_stats.mean),
                width_max: measured.then_some(report.width_stats.max),
            },
        }
    }
}

fn load_config(config_path: Option<&Path>, preset: Preset) -> Result<SupportConfig> {
    let Some(path) = config_path else {
        return Ok(preset_config(preset));
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    let config = SupportConfig::from_json(&text)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

pub fn run(
    input: &Path,
    config_path: Option<&Path>,
    preset: Preset,
    seed: u64,
    output_path: Option<&Path>,
    positions_only: bool,
    cli: &Cli,
) -> Result<()> {
    let config = load_config(config_path, preset)?;
    config.validate()?;

    let mesh =
        Mesh::load(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let report = generate_supports(&mesh, &PointGrid::default(), &config, &mut rng)?;

    let result = SampleOutput::from_report(input, seed, &report, positions_only);

    if let Some(path) = output_path {
        let json =
            serde_json::to_string_pretty(&result).context("Failed to serialize support points")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write support points to {:?}", path))?;
    }

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Support Points".bold().underline());
                println!("  {}: {}", "File".cyan(), input.display());
                println!("  {}: {}", "Seed".cyan(), seed);
                println!(
                    "  {}: {} triangles, {} vertices",
                    "Preprocessed".cyan(),
                    report.preprocessed_triangles,
                    report.preprocessed_vertices
                );
                println!("  {}: {}", "Widths".cyan(), report.width_stats);
                println!(
                    "  {}: {} accepted of {} candidates",
                    "Supports".cyan(),
                    report.points.len().to_string().green(),
                    report.candidates_generated
                );

                if let Some(path) = output_path {
                    println!("  {}: {}", "Written to".green(), path.display());
                } else {
                    for p in &result.points {
                        match p.radius {
                            Some(r) => println!(
                                "  {:>10.4} {:>10.4} {:>10.4}  r={:.4}",
                                p.position[0], p.position[1], p.position[2], r
                            ),
                            None => println!(
                                "  {:>10.4} {:>10.4} {:>10.4}",
                                p.position[0], p.position[1], p.position[2]
                            ),
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
