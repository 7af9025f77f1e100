use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::{info, LevelFilter};

use crate::application::{MosaicService, SearchReport};
use crate::domain::{
    instance::{MosaicInstance, RawInstance},
    models::{SearchConfig, SolverConfig, DEFAULT_DELTA},
    value_objects::{PropagationEncoding, SolverBackend},
};

/// Select satellite images for a mosaic and print the non-dominated selections as JSON
#[derive(Debug, Parser)]
#[command(name = "mosaicopt", version)]
pub struct Args {
    /// JSON file holding the instance arrays
    pub instance: PathBuf,

    /// MIP backend: auto, microlp, cbc or highs
    #[arg(short = 'b', long = "backend", default_value = "auto")]
    pub backend: SolverBackend,

    /// Time limit of a single solve, in seconds
    #[arg(short = 't', long = "time-limit", value_parser = parse_time_limit)]
    pub time_limit: Option<Duration>,

    #[arg(long = "threads")]
    pub threads: Option<u32>,

    /// Weight of the augmentation term, within [1e-6, 1e-3]
    #[arg(long = "delta", default_value_t = DEFAULT_DELTA)]
    pub delta: f64,

    /// How selections propagate to effective resolutions and angles
    #[arg(long = "encoding", default_value = "indicator")]
    pub encoding: PropagationEncoding,

    /// Compute exact ideal values before the search
    #[arg(long = "payoff-table", default_value_t = false)]
    pub payoff_table: bool,

    /// Stop after this many epsilon iterations
    #[arg(long = "max-iterations")]
    pub max_iterations: Option<usize>,

    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn solver_config(&self) -> SolverConfig {
        let mut config = SolverConfig::default()
            .with_backend(self.backend)
            .with_verbose(self.verbose);
        if let Some(limit) = self.time_limit {
            config = config.with_time_limit(limit);
        }
        if let Some(threads) = self.threads {
            config = config.with_threads(threads);
        }
        config
    }

    pub fn search_config(&self) -> SearchConfig {
        let mut config = SearchConfig::default()
            .with_delta(self.delta)
            .with_encoding(self.encoding)
            .with_payoff_table(self.payoff_table);
        if let Some(max) = self.max_iterations {
            config = config.with_max_iterations(max);
        }
        config
    }
}

/// Seconds as a non-negative, finite duration
fn parse_time_limit(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid time limit {}: {}", value, e))
}

/// Log to stderr so stdout only carries the JSON report
pub fn configure_logging(verbose: bool) {
    let level_filter = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .filter_level(level_filter)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

pub fn load_instance(path: &Path) -> Result<MosaicInstance, Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(path)?;
    let raw: RawInstance = serde_json::from_str(&contents)?;
    Ok(MosaicInstance::from_arrays(raw)?)
}

pub fn run(args: &Args) -> Result<SearchReport, Box<dyn std::error::Error>> {
    let instance = load_instance(&args.instance)?;
    info!("Loaded instance from {}", args.instance.display());

    let service = MosaicService::new(args.solver_config(), args.search_config());
    Ok(service.solve(&instance)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_into_configs() {
        let args = Args::parse_from([
            "mosaicopt",
            "instance.json",
            "--backend",
            "microlp",
            "--time-limit",
            "2.5",
            "--delta",
            "0.0001",
            "--encoding",
            "multiplicative",
            "--max-iterations",
            "7",
        ]);
        let solver = args.solver_config();
        assert_eq!(solver.backend, SolverBackend::MicroLp);
        assert_eq!(solver.time_limit, Some(Duration::from_millis(2500)));
        let search = args.search_config();
        assert_eq!(search.delta, 0.0001);
        assert_eq!(search.encoding, PropagationEncoding::Multiplicative);
        assert_eq!(search.max_iterations, Some(7));
        assert!(!search.payoff_table);
    }

    #[test]
    fn defaults_match_library_defaults() {
        let args = Args::parse_from(["mosaicopt", "instance.json"]);
        assert_eq!(args.backend, SolverBackend::Auto);
        assert_eq!(args.search_config().delta, DEFAULT_DELTA);
        assert_eq!(args.solver_config().time_limit, None);
    }

    #[test]
    fn time_limit_must_be_a_finite_duration() {
        for bad in ["inf", "-1", "1e30", "soon"] {
            let parsed = Args::try_parse_from(["mosaicopt", "x.json", "--time-limit", bad]);
            assert!(parsed.is_err(), "{} accepted", bad);
        }
        let args = Args::parse_from(["mosaicopt", "x.json", "-t", "0"]);
        assert_eq!(args.solver_config().time_limit, Some(Duration::ZERO));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let parsed = Args::try_parse_from(["mosaicopt", "x.json", "--backend", "gurobi"]);
        assert!(parsed.is_err());
    }
}
