//! Benchmark harness: reads whitespace-separated configuration lines,
//! supervises each run as a child process with a timeout, and emits a CSV
//! row per run. Grounded on the original's `multiprocessing.Process` /
//! `Queue` / `proc.join(timeout)` pattern, reimplemented with
//! `std::process::Command` and a watchdog thread per §5.

use std::process::{Child, Command};
use std::time::{Duration, Instant};

use crate::architecture::ArchitectureKind;

/// Errors raised while parsing a benchmark configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("line {0}: expected 7 whitespace-separated fields, got {1}")]
    WrongFieldCount(usize, usize),
    #[error("line {0}: unknown guard type '{1}'")]
    UnknownGuardType(usize, String),
    #[error("line {0}: invalid integer range list '{1}'")]
    InvalidRangeList(usize, String),
    #[error("line {0}: invalid integer list '{1}'")]
    InvalidIntList(usize, String),
    #[error("line {0}: invalid integer '{1}'")]
    InvalidInt(usize, String),
    #[error("line {0}: unknown flag token '{1}'")]
    UnknownFlag(usize, String),
}

/// One parsed configuration line: a benchmark sweep over instance counts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkConfigItem {
    pub filename: String,
    pub guard_type: ArchitectureKind,
    pub instances: Vec<usize>,
    pub min_bounds: Vec<usize>,
    pub max_increment: usize,
    pub use_label_guards: bool,
    pub use_test_mode: bool,
    pub use_scc: bool,
    pub save_dot: bool,
    pub run_count: usize,
}

const LABEL_FLAG: &str = "labels";
const TEST_MODE_FLAG: &str = "test";
const SCC_FLAG: &str = "scc";
const DOT_FLAG: &str = "dot";

fn is_setting_active(settings: &[String], name: &str, line: usize) -> Result<bool, ConfigurationError> {
    let negated = format!("no-{name}");
    if settings.iter().any(|s| s == name) {
        Ok(true)
    } else if settings.iter().any(|s| s == &negated) {
        Ok(false)
    } else {
        Err(ConfigurationError::UnknownFlag(line, name.to_string()))
    }
}

fn parse_int_list(value: &str, line: usize) -> Result<Vec<usize>, ConfigurationError> {
    value
        .split(',')
        .map(|s| s.parse::<usize>().map_err(|_| ConfigurationError::InvalidIntList(line, value.to_string())))
        .collect()
}

/// `a:b[,c:d...]` — a union of inclusive integer ranges, flattened and
/// sorted, matching `_get_int_range_list`'s semantics.
fn parse_int_range_list(value: &str, line: usize) -> Result<Vec<usize>, ConfigurationError> {
    let mut out = Vec::new();
    for part in value.split(',') {
        let (lo, hi) = part
            .split_once(':')
            .ok_or_else(|| ConfigurationError::InvalidRangeList(line, value.to_string()))?;
        let lo: usize = lo.parse().map_err(|_| ConfigurationError::InvalidRangeList(line, value.to_string()))?;
        let hi: usize = hi.parse().map_err(|_| ConfigurationError::InvalidRangeList(line, value.to_string()))?;
        out.extend(lo..=hi);
    }
    Ok(out)
}

/// Parse one non-empty, non-comment configuration line:
/// `filename guard_type instance_ranges bounds max_increment flag_list runs`.
pub fn parse_config_line(line: &str, line_number: usize) -> Result<Option<BenchmarkConfigItem>, ConfigurationError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() != 7 {
        return Err(ConfigurationError::WrongFieldCount(line_number, fields.len()));
    }
    let [filename, guard_type, instances, bounds, max_increment, flags, run_count] = fields[..] else {
        unreachable!()
    };

    let guard_type = ArchitectureKind::from_name(guard_type)
        .ok_or_else(|| ConfigurationError::UnknownGuardType(line_number, guard_type.to_string()))?;
    let instances = parse_int_range_list(instances, line_number)?;
    let min_bounds = parse_int_list(bounds, line_number)?;
    let max_increment: usize = max_increment
        .parse()
        .map_err(|_| ConfigurationError::InvalidInt(line_number, max_increment.to_string()))?;
    let run_count: usize = run_count
        .parse()
        .map_err(|_| ConfigurationError::InvalidInt(line_number, run_count.to_string()))?;
    let settings: Vec<String> = flags.split(',').map(String::from).collect();

    Ok(Some(BenchmarkConfigItem {
        filename: filename.to_string(),
        guard_type,
        instances,
        min_bounds,
        max_increment,
        use_label_guards: is_setting_active(&settings, LABEL_FLAG, line_number)?,
        use_test_mode: is_setting_active(&settings, TEST_MODE_FLAG, line_number)?,
        use_scc: is_setting_active(&settings, SCC_FLAG, line_number)?,
        save_dot: is_setting_active(&settings, DOT_FLAG, line_number)?,
        run_count,
    }))
}

/// Parse every non-empty line of a configuration file's contents.
pub fn parse_config(content: &str) -> Result<Vec<BenchmarkConfigItem>, ConfigurationError> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| parse_config_line(line, i + 1).transpose())
        .collect()
}

/// Outcome of one supervised child-process run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BenchmarkTestOutcome {
    Satisfiable { final_bound: Vec<usize> },
    Unsatisfiable { final_bound: Vec<usize> },
    Timeout,
    InvalidExit { code: Option<i32> },
}

/// One completed benchmark run, ready to be rendered as a CSV row.
pub struct BenchmarkTestResult {
    pub benchmark_index: usize,
    pub run_index: usize,
    pub spec: String,
    pub instances: usize,
    pub min_bound: usize,
    pub use_label_guards: bool,
    pub use_scc: bool,
    pub use_test_mode: bool,
    pub outcome: BenchmarkTestOutcome,
    pub runtime: Duration,
}

impl BenchmarkTestResult {
    /// Render as the CSV row format of §6:
    /// `benchmark_index;run_index;spec;instances;min_bound;{labels,no-labels};{scc,no-scc};{test,no-test};final_bound;sat/unsat;runtime;description`.
    pub fn to_csv_row(&self) -> String {
        let (final_bound, sat) = match &self.outcome {
            BenchmarkTestOutcome::Satisfiable { final_bound } => (format_bound(final_bound), "sat"),
            BenchmarkTestOutcome::Unsatisfiable { final_bound } => (format_bound(final_bound), "unsat"),
            BenchmarkTestOutcome::Timeout => ("-".to_string(), "timeout"),
            BenchmarkTestOutcome::InvalidExit { .. } => ("-".to_string(), "error"),
        };
        let description = match &self.outcome {
            BenchmarkTestOutcome::InvalidExit { code } => format!("exit code {code:?}"),
            _ => String::new(),
        };
        format!(
            "{};{};{};{};{};{};{};{};{};{};{:.3};{}",
            self.benchmark_index,
            self.run_index,
            self.spec,
            self.instances,
            self.min_bound,
            if self.use_label_guards { "labels" } else { "no-labels" },
            if self.use_scc { "scc" } else { "no-scc" },
            if self.use_test_mode { "test" } else { "no-test" },
            final_bound,
            sat,
            self.runtime.as_secs_f64(),
            description
        )
    }
}

fn format_bound(bound: &[usize]) -> String {
    bound.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(",")
}

/// Spawn `binary` with `args`, wait up to `timeout`, and kill it if it runs
/// over. Mirrors `proc.join(timeout); proc.terminate()` from the original.
pub fn run_with_timeout(binary: &str, args: &[String], timeout: Duration) -> std::io::Result<RunOutcome> {
    let start = Instant::now();
    let mut child: Child = Command::new(binary).args(args).spawn()?;

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(RunOutcome {
                exit_code: status.code(),
                timed_out: false,
                runtime: start.elapsed(),
            });
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(RunOutcome {
                exit_code: None,
                timed_out: true,
                runtime: start.elapsed(),
            });
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub runtime: Duration,
}

/// Write every result's CSV row to `writer`, one per line.
pub fn write_csv<W: std::io::Write>(writer: &mut W, results: &[BenchmarkTestResult]) -> std::io::Result<()> {
    for r in results {
        writeln!(writer, "{}", r.to_csv_row())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ignores_comments_and_blank_lines() {
        let content = "# comment\n\nfile.spec conjunctive 1:2 2,3 10 labels,scc,no-test,no-dot 3\n";
        let items = parse_config(content).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].filename, "file.spec");
        assert_eq!(items[0].instances, vec![1, 2]);
        assert_eq!(items[0].min_bounds, vec![2, 3]);
        assert!(items[0].use_label_guards);
        assert!(items[0].use_scc);
        assert!(!items[0].use_test_mode);
        assert!(!items[0].save_dot);
    }

    #[test]
    fn rejects_unknown_flag_token() {
        let line = "file.spec conjunctive 1:2 2 10 bogus 1";
        let err = parse_config_line(line, 1).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownFlag(1, _)));
    }

    #[test]
    fn rejects_malformed_field_count() {
        let line = "file.spec conjunctive 1:2";
        let err = parse_config_line(line, 5).unwrap_err();
        assert!(matches!(err, ConfigurationError::WrongFieldCount(5, 3)));
    }

    #[test]
    fn rejects_unknown_guard_type() {
        let line = "file.spec mystery 1:2 2 10 no-labels,no-scc,no-test,no-dot 1";
        let err = parse_config_line(line, 2).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownGuardType(2, _)));
    }

    #[test]
    fn csv_row_matches_expected_shape() {
        let result = BenchmarkTestResult {
            benchmark_index: 0,
            run_index: 1,
            spec: "mutex.spec".into(),
            instances: 2,
            min_bound: 2,
            use_label_guards: false,
            use_scc: true,
            use_test_mode: false,
            outcome: BenchmarkTestOutcome::Satisfiable { final_bound: vec![2] },
            runtime: Duration::from_millis(1500),
        };
        let row = result.to_csv_row();
        assert!(row.starts_with("0;1;mutex.spec;2;2;no-labels;scc;no-test;2;sat;1.500"));
    }

    #[test]
    fn int_range_list_flattens_and_unions() {
        assert_eq!(parse_int_range_list("1:2,4:5", 1).unwrap(), vec![1, 2, 4, 5]);
    }
}
