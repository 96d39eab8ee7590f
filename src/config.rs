//! Paths and format defaults, overridable via CLI flags or environment
//! variables.

use std::path::PathBuf;

/// External-binary and output-directory configuration for one pipeline run.
#[derive(Clone, Debug)]
pub struct Paths {
    pub z3_path: String,
    pub ltl2ba_path: String,
    pub dot_output_dir: PathBuf,
}

impl Paths {
    /// Default binary names, overridable via `SYNTH_Z3_PATH`/`SYNTH_LTL2BA_PATH`,
    /// falling back to `z3`/`ltl2ba` on `$PATH`.
    pub fn from_env() -> Self {
        Paths {
            z3_path: std::env::var("SYNTH_Z3_PATH").unwrap_or_else(|_| "z3".to_string()),
            ltl2ba_path: std::env::var("SYNTH_LTL2BA_PATH").unwrap_or_else(|_| "ltl2ba".to_string()),
            dot_output_dir: PathBuf::from("solutions"),
        }
    }

    pub fn with_dot_output_dir(mut self, dir: PathBuf) -> Self {
        self.dot_output_dir = dir;
        self
    }
}

impl Default for Paths {
    fn default() -> Self {
        Paths::from_env()
    }
}

/// Maps `-v` repeat count to a `tracing` level filter, matching the
/// original's 0..5 `off,error,warn,info,debug,trace` table.
pub fn verbosity_to_level_filter(count: u8) -> &'static str {
    match count {
        0 => "off",
        1 => "error",
        2 => "warn",
        3 => "info",
        4 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_table_matches_original() {
        assert_eq!(verbosity_to_level_filter(0), "off");
        assert_eq!(verbosity_to_level_filter(3), "info");
        assert_eq!(verbosity_to_level_filter(9), "trace");
    }

    #[test]
    fn paths_default_to_bare_binary_names_without_env() {
        std::env::remove_var("SYNTH_Z3_PATH");
        std::env::remove_var("SYNTH_LTL2BA_PATH");
        let paths = Paths::from_env();
        assert_eq!(paths.z3_path, "z3");
        assert_eq!(paths.ltl2ba_path, "ltl2ba");
    }
}
