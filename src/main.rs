//! Sensor network simulator entry point: CLI wiring and scenario construction.

use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;

use wsn_energy_sim::config::ScenarioConfig;
use wsn_energy_sim::io::export::export_run;
use wsn_energy_sim::runner::run_scenario;
use wsn_energy_sim::sim::kpi::{DEFAULT_FAILURE_THRESHOLD, LifetimeReport};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    policy_override: Option<u8>,
    series_out: Option<String>,
}

fn print_help() {
    eprintln!("wsn-energy-sim: solar-harvesting sensor network energy simulator");
    eprintln!();
    eprintln!("Usage: wsn-energy-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override the cloud occlusion seed");
    eprintln!("  --policy <1-6>           Override the energy management policy");
    eprintln!("  --series-out <dir>       Export per-node series and the message log as CSV");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

fn required_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        policy_override: None,
        series_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = Some(required_value(&args, i, "--scenario", "a path argument"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(required_value(&args, i, "--preset", "a name argument"));
            }
            "--seed" => {
                i += 1;
                let raw = required_value(&args, i, "--seed", "a u64 argument");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--policy" => {
                i += 1;
                let raw = required_value(&args, i, "--policy", "a policy id");
                if let Ok(p) = raw.parse::<u8>() {
                    cli.policy_override = Some(p);
                } else {
                    eprintln!("error: --policy value \"{raw}\" is not a valid policy id");
                    process::exit(1);
                }
            }
            "--series-out" => {
                i += 1;
                cli.series_out = Some(required_value(&args, i, "--series-out", "a directory"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::baseline()
    };

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(policy) = cli.policy_override {
        scenario.policy.id = policy;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let run = match run_scenario(&scenario) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    for (node, result) in &run.results {
        println!(
            "node {node:>3} | {:>7} steps | {:<17} | consumed {:>10.3} J | forwarding {:>8.3} J | {} msgs | {} switches",
            result.records.len(),
            result.termination,
            result.energy_consumed_j,
            result.communication_energy_j,
            result.communication_log.len(),
            result.switch_count,
        );
    }
    println!("\nMessages routed: {}", run.communication_log.len());

    let report = LifetimeReport::from_results(
        &run.results,
        scenario.simulation.dt_s,
        DEFAULT_FAILURE_THRESHOLD,
    );
    println!("\n{report}");

    if let Some(ref dir) = cli.series_out {
        if let Err(e) = export_run(&run, Path::new(dir)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Series written to {dir}");
    }
}
