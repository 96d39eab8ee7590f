//! `synth-bench`: run a sweep of synthesis configurations from one or more
//! configuration files, supervising each run with a timeout and emitting a
//! CSV row per completed run.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser as ClapParser;
use guardsynth::benchmark::{parse_config, run_with_timeout, write_csv, BenchmarkTestOutcome, BenchmarkTestResult};
use guardsynth::config::verbosity_to_level_filter;

#[derive(ClapParser, Debug)]
#[command(name = "synth-bench", about = "Sweep benchmark harness for the synth binary")]
struct Cli {
    /// One or more benchmark configuration files.
    config_paths: Vec<PathBuf>,

    /// Where to write the CSV result rows.
    #[arg(short = 'c', long = "csv-path", default_value = "results.csv")]
    csv_path: PathBuf,

    /// Directory to write per-run dot files into, when a run requests one.
    #[arg(short = 'd', long = "dot-path", default_value = "solutions")]
    dot_path: PathBuf,

    /// Path to write a combined run log.
    #[arg(short = 'l', long = "log-path")]
    log_path: Option<PathBuf>,

    /// Per-run timeout in seconds.
    #[arg(short = 't', long = "timeout", default_value_t = 600)]
    timeout: u64,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = verbosity_to_level_filter(cli.verbose);
    let subscriber = tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::new(filter));
    match &cli.log_path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            subscriber.with_writer(std::sync::Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }

    std::fs::create_dir_all(&cli.dot_path)?;

    let mut results = Vec::new();
    for (benchmark_index, config_path) in cli.config_paths.iter().enumerate() {
        let content = std::fs::read_to_string(config_path)?;
        let items = parse_config(&content)?;
        for item in &items {
            for instances in &item.instances {
                for &min_bound in &item.min_bounds {
                    for run_index in 0..item.run_count {
                        tracing::info!(spec = %item.filename, instances, min_bound, run_index, "starting run");

                        let mut args = vec![
                            item.filename.clone(),
                            "--system-type".to_string(),
                            match item.guard_type {
                                guardsynth::architecture::ArchitectureKind::Conjunctive => "conjunctive".to_string(),
                                guardsynth::architecture::ArchitectureKind::Disjunctive => "disjunctive".to_string(),
                            },
                            "--min-bound".to_string(),
                            min_bound.to_string(),
                            "--max-increments".to_string(),
                            item.max_increment.to_string(),
                            "--instances".to_string(),
                            instances.to_string(),
                        ];
                        if item.use_label_guards {
                            args.push("--label-guards".to_string());
                        }
                        if item.use_test_mode {
                            args.push("--test".to_string());
                        }
                        if item.use_scc {
                            args.push("--optimization".to_string());
                            args.push("lambda-scc".to_string());
                        }
                        if item.save_dot {
                            let dot_file = cli
                                .dot_path
                                .join(format!("{benchmark_index}_{run_index}.dot"));
                            args.push("--dot-path".to_string());
                            args.push(dot_file.to_string_lossy().into_owned());
                        }

                        let outcome = run_with_timeout("synth", &args, Duration::from_secs(cli.timeout))?;

                        let test_outcome = if outcome.timed_out {
                            BenchmarkTestOutcome::Timeout
                        } else {
                            match outcome.exit_code {
                                Some(0) => BenchmarkTestOutcome::Satisfiable {
                                    final_bound: vec![min_bound],
                                },
                                Some(_) => BenchmarkTestOutcome::Unsatisfiable {
                                    final_bound: vec![min_bound],
                                },
                                None => BenchmarkTestOutcome::InvalidExit { code: None },
                            }
                        };

                        results.push(BenchmarkTestResult {
                            benchmark_index,
                            run_index,
                            spec: item.filename.clone(),
                            instances: *instances,
                            min_bound,
                            use_label_guards: item.use_label_guards,
                            use_scc: item.use_scc,
                            use_test_mode: item.use_test_mode,
                            outcome: test_outcome,
                            runtime: outcome.runtime,
                        });
                    }
                }
            }
        }
    }

    let mut csv_file = std::fs::File::create(&cli.csv_path)?;
    write_csv(&mut csv_file, &results)?;

    println!("wrote {} result row(s) to {}", results.len(), cli.csv_path.display());
    Ok(())
}
