//! `synth`: read a specification file, run the bounded-synthesis loop, and
//! print the resulting model (optionally rendering it as a dot file).

use std::path::PathBuf;

use clap::Parser as ClapParser;
use guardsynth::architecture::{Architecture, ArchitectureKind};
use guardsynth::config::{verbosity_to_level_filter, Paths};
use guardsynth::encoder::EncodingOptimization;
use guardsynth::ltl_service::{MemoizingLtlService, ShellLtlService};
use guardsynth::parser::parse_specification;
use guardsynth::solver::ShellSolver;
use guardsynth::synthesis::{synthesize, SynthesisOptions};

#[derive(ClapParser, Debug)]
#[command(name = "synth", about = "Parameterized bounded synthesis of guarded distributed systems")]
struct Cli {
    /// Path to the specification file.
    ltl_filepath: PathBuf,

    /// Guard architecture: "conjunctive" or "disjunctive".
    #[arg(long = "system-type", default_value = "disjunctive")]
    system_type: String,

    /// Starting per-template bound, comma-separated (one value, repeated
    /// across templates, or one per template).
    #[arg(long = "min-bound", default_value = "1")]
    min_bound: String,

    /// Maximum number of iterative-deepening rounds.
    #[arg(long = "max-increments", default_value_t = 10)]
    max_increments: usize,

    /// Fixed instance count per template, comma-separated.
    #[arg(long = "instances")]
    instances: String,

    /// Skip cut-off computation and run directly at --instances.
    #[arg(long = "test")]
    test: bool,

    /// Encoding optimization: "none" or "lambda-scc".
    #[arg(long = "optimization", default_value = "none")]
    optimization: String,

    /// Use label-guarded encoding instead of state-guarded.
    #[arg(long = "label-guards")]
    label_guards: bool,

    /// Write the synthesized model as a dot file at this path.
    #[arg(long = "dot-path")]
    dot_path: Option<PathBuf>,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_counts(value: &str, k: usize) -> anyhow::Result<Vec<usize>> {
    let parts: Vec<usize> = value
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<Result<_, _>>()?;
    if parts.len() == 1 && k > 1 {
        return Ok(vec![parts[0]; k]);
    }
    anyhow::ensure!(parts.len() == k, "expected {k} comma-separated values, got {}", parts.len());
    Ok(parts)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = verbosity_to_level_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let content = std::fs::read_to_string(&cli.ltl_filepath)?;
    let mut spec = parse_specification(&content)?;
    let k = spec.templates_count();

    let kind = ArchitectureKind::from_name(&cli.system_type)
        .ok_or_else(|| anyhow::anyhow!("unknown system type '{}'", cli.system_type))?;
    let architecture = Architecture::new(kind);

    let optimization = match cli.optimization.as_str() {
        "none" => EncodingOptimization::None,
        "lambda-scc" => EncodingOptimization::LambdaScc,
        other => anyhow::bail!("unknown optimization '{other}'"),
    };

    let options = SynthesisOptions {
        min_bound: parse_counts(&cli.min_bound, k)?,
        max_increments: cli.max_increments,
        instance_count: parse_counts(&cli.instances, k)?,
        test_mode: cli.test,
        optimization,
        label_guards: cli.label_guards,
    };

    let paths = Paths::from_env();
    let ltl = MemoizingLtlService::new(ShellLtlService::new(paths.ltl2ba_path.clone()));

    let outcome = synthesize(
        &mut spec,
        &architecture,
        &ltl,
        || ShellSolver::spawn(&paths.z3_path).expect("failed to spawn solver"),
        &options,
    )?;

    match outcome.models {
        Some(models) => {
            tracing::info!(bound = ?outcome.final_bound, rounds = outcome.rounds_run, "synthesis succeeded");
            println!("SAT at bound {:?} after {} round(s)", outcome.final_bound, outcome.rounds_run);
            for (index, model) in &models {
                println!("{model}");
                let _ = index;
            }
            if let Some(dot_path) = cli.dot_path {
                let dot = guardsynth::dot::render(&models);
                std::fs::write(dot_path, dot)?;
            }
        }
        None => {
            tracing::info!(bound = ?outcome.final_bound, rounds = outcome.rounds_run, "synthesis exhausted");
            println!("UNSAT up to bound {:?} after {} round(s)", outcome.final_bound, outcome.rounds_run);
        }
    }

    Ok(())
}
