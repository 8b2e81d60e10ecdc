// Bandstand CLI entry point.
//
// Renders a rhythm-section performance of a chord chart and writes it to
// MIDI. The pipeline: load chart -> configure the band -> render bar by
// bar -> write MIDI.
//
// Usage:
//   cargo run -p bandstand_engine -- [output.mid] [--chart chart.json]
//     [--tempo BPM] [--choruses N] [--energy X] [--swing X] [--seed N]
//     [--voicing-weights weights.json] [--waltz] [--plain]
//
// With no --chart, the built-in demo blues is used. --plain turns off
// the modern extension seasoning in the voicings.

use bandstand_engine::chart::ChordChart;
use bandstand_engine::midi::write_midi;
use bandstand_engine::performance::{PerformConfig, Performer};
use bandstand_engine::voicing::VoicingWeights;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let output_path = args
        .get(1)
        .filter(|s| !s.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("performance.mid");
    let chart_path: Option<String> = parse_flag(&args, "--chart");
    let tempo: f64 = parse_flag(&args, "--tempo").unwrap_or(140.0);
    let choruses: usize = parse_flag(&args, "--choruses").unwrap_or(3);
    let energy: f64 = parse_flag(&args, "--energy").unwrap_or(0.5);
    let swing: f64 = parse_flag(&args, "--swing").unwrap_or(2.0 / 3.0);
    let seed: Option<u64> = parse_flag(&args, "--seed");
    let weights_path: Option<String> = parse_flag(&args, "--voicing-weights");
    let waltz = args.iter().any(|a| a == "--waltz");
    let plain = args.iter().any(|a| a == "--plain");

    println!("=== Bandstand ===");
    println!("Output: {output_path}");

    // Load the chart.
    println!("[1/4] Loading chart...");
    let chart = match &chart_path {
        Some(path) => match ChordChart::load(Path::new(path)) {
            Ok(chart) => {
                println!("  Loaded \"{}\" ({} slots).", chart.title, chart.entries.len());
                chart
            }
            Err(e) => {
                eprintln!("  Failed to load {path}: {e}");
                std::process::exit(1);
            }
        },
        None => {
            let chart = ChordChart::demo();
            println!("  Using the built-in \"{}\".", chart.title);
            chart
        }
    };
    let unresolved: Vec<&str> = chart
        .entries
        .iter()
        .filter(|e| bandstand_theory::chord::resolve(&e.symbol).is_none())
        .map(|e| e.symbol.as_str())
        .collect();
    if !unresolved.is_empty() {
        println!(
            "  Warning: {} unresolvable symbol(s) will play as rests: {}",
            unresolved.len(),
            unresolved.join(", ")
        );
    }

    // Configure the band.
    println!("[2/4] Setting up the band...");
    let config = PerformConfig {
        tempo_bpm: tempo,
        swing,
        waltz,
        energy: energy.clamp(0.0, 1.0),
        choruses,
        modern: !plain,
    };
    println!(
        "  Tempo {} BPM, {} choruses, energy {:.2}, {}",
        config.tempo_bpm,
        config.choruses,
        config.energy,
        if config.waltz { "3/4" } else { "4/4" },
    );
    let mut performer = Performer::new(chart, config);

    if let Some(path) = &weights_path {
        match load_weights(Path::new(path)) {
            Ok(weights) => {
                println!("  Loaded voicing weights from {path}.");
                performer.set_voicing_weights(weights);
            }
            Err(e) => println!("  Failed to load {path}: {e}. Using defaults."),
        }
    }

    // Render.
    println!("[3/4] Rendering...");
    let mut rng = match seed {
        Some(s) => {
            println!("  Seed: {s}");
            StdRng::seed_from_u64(s)
        }
        None => StdRng::from_os_rng(),
    };
    let performance = performer.render(&mut rng);
    println!(
        "  {} bars, {} events, {:.0}s.",
        performance.bars,
        performance.events.len(),
        performance.duration_seconds()
    );

    // Write MIDI.
    println!("[4/4] Writing MIDI to {output_path}...");
    match write_midi(&performance, Path::new(output_path)) {
        Ok(()) => println!("  Done."),
        Err(e) => {
            eprintln!("  Error writing MIDI: {e}");
            std::process::exit(1);
        }
    }

    println!();
    println!("Play with: timidity {output_path} (or any MIDI player)");
}

fn load_weights(path: &Path) -> Result<VoicingWeights, Box<dyn std::error::Error>> {
    let data = std::fs::read_to_string(path)?;
    let weights: VoicingWeights = serde_json::from_str(&data)?;
    Ok(weights)
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}
