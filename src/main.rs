//! Triage ADM - automated decision maker for mass-casualty triage scenarios
//!
//! Plays an evaluation session from a scenario file, choosing one action per
//! probe so that the choices match a KDMA alignment target.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate against the scenario file's own targets
//! triage-adm --scenario_file scenarios.json
//!
//! # Train the case base from scene feedback
//! triage-adm --scenario_file scenarios.json --session_type train --training
//!
//! # Aim for an explicit target
//! triage-adm --scenario_file scenarios.json --kdmas risk=0.2 --kdmas urgency=0.9
//!
//! # How well do the current weights predict the stored cases?
//! triage-adm --leave_one_out --case_base data/cases.jsonl
//! ```
//!
//! # Environment Variables
//!
//! - `TRIAGE_ADM_CONFIG`: path to the TOML config (default: ./adm_config.toml)
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::info;

use triage_adm::config::{self, AdmConfig, EstimatorVariant, WeightSettings};
use triage_adm::driver::{LocalServer, Session, SessionOptions, SessionType};
use triage_adm::kdma::leave_one_out_error;
use triage_adm::selector;
use triage_adm::storage::CaseBase;
use triage_adm::types::AlignmentTarget;
use triage_adm::MonteCarloAnalyzer;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "triage-adm")]
#[command(about = "Automated decision maker for mass-casualty triage")]
#[command(version)]
struct CliArgs {
    /// JSON scenario file played by the local evaluation server
    #[arg(long = "scenario_file", value_name = "PATH", required_unless_present = "leave_one_out")]
    scenario_file: Option<PathBuf>,

    /// Session type requested from the server: test, eval or train
    #[arg(long = "session_type", default_value = "test")]
    session_type: SessionType,

    /// Decision selector: kdma_estimation, severity or random
    #[arg(long, default_value = "kdma_estimation")]
    selector: String,

    /// Run only this scenario
    #[arg(long)]
    scenario: Option<String>,

    /// Alignment target: a JSON target file, or the id of the target built from --kdmas
    #[arg(long = "alignment_target")]
    alignment_target: Option<String>,

    /// Explicit target values as name=value (repeatable)
    #[arg(long = "kdmas", value_name = "NAME=VALUE")]
    kdmas: Vec<String>,

    /// Monte Carlo rollouts per probe
    #[arg(long)]
    rollouts: Option<usize>,

    /// Log the neighbours behind every KDMA estimate
    #[arg(long = "decision_verbose")]
    decision_verbose: bool,

    /// Commit new cases from scene feedback
    #[arg(long)]
    training: bool,

    /// Append every decision to this JSON-lines file
    #[arg(long, value_name = "PATH")]
    dump: Option<PathBuf>,

    /// Estimator variant: aligned, misaligned or baseline
    #[arg(long, value_parser = ["aligned", "misaligned", "baseline"])]
    variant: Option<String>,

    /// Case base file (overrides config)
    #[arg(long = "case_base", value_name = "PATH")]
    case_base: Option<PathBuf>,

    /// Start from an empty case base instead of continuing the existing file
    #[arg(long)]
    fresh: bool,

    #[arg(long = "max_scenarios")]
    max_scenarios: Option<usize>,

    /// Seed for every random source (drawn from entropy when absent)
    #[arg(long, env = "TRIAGE_ADM_SEED")]
    seed: Option<u64>,

    /// Config file (overrides the TRIAGE_ADM_CONFIG / ./adm_config.toml search)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Report the leave-one-out estimation error of the case base and exit
    #[arg(long = "leave_one_out")]
    leave_one_out: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs")]
    json_logs: bool,
}

fn kdma_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*$").ok()
        })
        .as_ref()
}

/// Parse one `name=value` target entry.
fn parse_kdma(raw: &str) -> Result<(String, f64)> {
    let Some(caps) = kdma_pattern().and_then(|re| re.captures(raw)) else {
        bail!("invalid KDMA '{raw}', expected name=value");
    };
    let value: f64 = caps[2].parse().with_context(|| format!("invalid KDMA value in '{raw}'"))?;
    Ok((caps[1].to_string(), value))
}

/// Resolve the target from `--alignment_target` and `--kdmas`, if either was given.
fn cli_target(args: &CliArgs) -> Result<Option<AlignmentTarget>> {
    if !args.kdmas.is_empty() {
        let pairs = args.kdmas.iter().map(|k| parse_kdma(k)).collect::<Result<Vec<_>>>()?;
        let borrowed: Vec<(&str, f64)> = pairs.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        let id = args.alignment_target.as_deref().unwrap_or("cli-target");
        return Ok(Some(AlignmentTarget::scalar(id, &borrowed)));
    }
    let Some(target) = args.alignment_target.as_deref() else {
        return Ok(None);
    };
    let path = PathBuf::from(target);
    if !path.exists() {
        bail!("alignment target '{target}' is not a file; pass --kdmas to build one");
    }
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let parsed: AlignmentTarget =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(parsed))
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn load_config(args: &CliArgs) -> Result<AdmConfig> {
    let mut cfg = match &args.config {
        Some(path) => AdmConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AdmConfig::load(),
    };
    if let Some(rollouts) = args.rollouts {
        cfg.simulation.rollouts = rollouts;
    }
    if args.decision_verbose {
        cfg.estimator.print_neighbors = true;
    }
    if let Some(variant) = args.variant.as_deref() {
        cfg.estimator.variant = match variant {
            "misaligned" => EstimatorVariant::Misaligned,
            "baseline" => EstimatorVariant::Baseline,
            _ => EstimatorVariant::Aligned,
        };
    }
    if let Some(path) = &args.case_base {
        cfg.case_base.path = path.clone();
    }
    if args.fresh {
        cfg.case_base.continue_existing = false;
    }
    if args.seed.is_some() {
        cfg.session.seed = args.seed;
    }
    if args.max_scenarios.is_some() {
        cfg.session.max_scenarios = args.max_scenarios;
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

/// Leave-one-out mean absolute error per KDMA over the stored cases.
///
/// KDMAs come from the CLI target when one is given, otherwise from the cases.
fn leave_one_out_report(
    cfg: &AdmConfig,
    target: Option<&AlignmentTarget>,
    seed: u64,
) -> Result<BTreeMap<String, f64>> {
    let base = CaseBase::open(&cfg.case_base.path, true)
        .with_context(|| format!("opening case base {}", cfg.case_base.path.display()))?;
    let settings = WeightSettings::load_or_uniform(cfg.estimator.weight_file.as_deref());
    let kdmas: BTreeSet<String> = match target {
        Some(t) => t.points().into_iter().map(|(k, _)| k.to_lowercase()).collect(),
        None => base.cases().iter().flat_map(|c| c.kdmas.keys().cloned()).collect(),
    };
    Ok(kdmas
        .into_iter()
        .map(|kdma| {
            let error = leave_one_out_error(&settings, &kdma, base.cases(), cfg.estimator.neighbor_count, seed);
            info!(kdma = %kdma, cases = base.len(), error, "Leave-one-out error");
            (kdma, error)
        })
        .collect())
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    config::init(load_config(&args)?);
    let cfg = config::get();
    let target = cli_target(&args)?;

    let seed = cfg.session.seed.unwrap_or_else(rand::random);
    info!(
        adm = %cfg.session.adm_name,
        seed,
        rollouts = cfg.simulation.rollouts,
        selector = %args.selector,
        variant = %cfg.estimator.variant,
        "Starting triage ADM"
    );

    if args.leave_one_out {
        let report = leave_one_out_report(cfg, target.as_ref(), seed)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let Some(scenario_file) = args.scenario_file.as_deref() else {
        bail!("--scenario_file is required");
    };

    let weights = WeightSettings::load_or_uniform(cfg.estimator.weight_file.as_deref());
    let Some(selector) = selector::by_name(&args.selector, weights, cfg.estimator.clone()) else {
        bail!("unknown selector '{}' (expected kdma_estimation, severity or random)", args.selector);
    };
    let case_base = CaseBase::open(&cfg.case_base.path, cfg.case_base.continue_existing)
        .with_context(|| format!("opening case base {}", cfg.case_base.path.display()))?;
    let server = LocalServer::from_path(scenario_file, &cfg.simulation)?;

    let options = SessionOptions {
        adm_name: cfg.session.adm_name.clone(),
        session_type: args.session_type,
        max_scenarios: cfg.session.max_scenarios,
        training: args.training || args.session_type == SessionType::Train,
        scenario: args.scenario.clone(),
        target,
        dump: args.dump.clone(),
    };
    let mut session = Session::new(
        server,
        Box::new(MonteCarloAnalyzer::new(cfg.simulation.clone())),
        selector,
        case_base,
        StdRng::seed_from_u64(seed),
        options,
    )?;
    let report = session.run()?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
