// Copyright 2020 TwoCookingMice

use std::path::PathBuf;

use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use bifacial::core::computation_node::ComputationNode;
use bifacial::core::material::{Material, MaterialId};
use bifacial::core::registry::MaterialRegistry;
use bifacial::core::scene_loader::{load_scene, SceneLoadError};
use bifacial::integrators::furnace::FurnaceProbe;
use bifacial::math::spectrum::RGBSpectrum;

/// Inspect the materials of a scene and probe the albedo of both faces.
#[derive(Debug, Parser)]
#[command(name = "bifacial", version, about)]
struct Args {
    /// Material scene description (XML).
    scene: PathBuf,

    /// Only report these materials; every material when omitted.
    #[arg(short, long = "material", value_name = "NAME")]
    materials: Vec<String>,

    /// Furnace samples per face.
    #[arg(long, default_value_t = 4096)]
    samples: u32,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Print property records without running the furnace probe.
    #[arg(long)]
    properties_only: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), SceneLoadError> {
    let scene = load_scene(&args.scene)?;
    let registry = scene.registry;

    let ids = if args.materials.is_empty() {
        registry.dependency_order()
    } else {
        args.materials
            .iter()
            .map(|name| registry.lookup(name).ok_or_else(|| SceneLoadError::UnknownReference(name.clone())))
            .collect::<Result<Vec<_>, _>>()?
    };

    let probe = FurnaceProbe::new(args.samples, args.seed);
    for id in ids {
        report(&registry, id, &probe, args.properties_only);
    }
    Ok(())
}

fn report(registry: &MaterialRegistry, id: MaterialId, probe: &FurnaceProbe, properties_only: bool) {
    let material = &registry[id];
    println!("{} {}", style(material.id()).bold().cyan(), style(material.describe()).dim());
    print!("{}", material.to_properties(registry));

    if properties_only || material.is_volume() {
        println!();
        return;
    }

    let progress = ProgressBar::new(2 * probe.samples as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let front = probe.side_albedo_with(registry, id, true, |_| progress.inc(1));
    let back = probe.side_albedo_with(registry, id, false, |_| progress.inc(1));
    progress.finish_and_clear();

    println!("  front albedo: {}", format_rgb(&front));
    println!("  back albedo:  {}", format_rgb(&back));
    println!();
}

fn format_rgb(value: &RGBSpectrum) -> String {
    format!("{:.4} {:.4} {:.4}", value[0], value[1], value[2])
}
