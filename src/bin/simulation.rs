//! Triage Outcome Simulation
//!
//! Runs the Monte Carlo analyzer over every probe of a scenario file and
//! prints the metric bundle and justification of each candidate action as
//! JSON, for offline inspection of the medical simulator.
//!
//! Probes are analyzed in isolation: each uses its own state when the file
//! gives one, otherwise the scenario's initial state.
//!
//! # Usage
//! ```bash
//! ./simulation --scenario_file scenarios.json --rollouts 200 --seed 7 > metrics.json
//!
//! # Sensitivity to reported severities
//! ./simulation --scenario_file scenarios.json --severity_noise 0.1
//! ```

use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use triage_adm::analyzer::{DecisionAnalyzer, MonteCarloAnalyzer};
use triage_adm::config::SimulationConfig;
use triage_adm::driver::{ground_actions, ScenarioFile};
use triage_adm::types::{MetricRank, MetricValue, Probe, TriageState};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "triage-simulation")]
#[command(about = "Monte Carlo outcome metrics for every candidate action of a scenario file")]
#[command(version = "1.0")]
struct Args {
    /// JSON scenario file
    #[arg(long = "scenario_file")]
    scenario_file: PathBuf,

    /// Only this scenario
    #[arg(long)]
    scenario: Option<String>,

    /// Rollouts per probe
    #[arg(long, default_value = "500")]
    rollouts: usize,

    /// Tree depth
    #[arg(long = "max_depth", default_value = "2")]
    max_depth: usize,

    /// Roll supply failure chances
    #[arg(long = "failure_chance")]
    failure_chance: bool,

    /// Standard deviation of Gaussian noise added to every injury severity
    #[arg(long = "severity_noise", default_value = "0.0")]
    severity_noise: f64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the briefing on stderr
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Serialize)]
struct CandidateReport {
    id: String,
    action: String,
    metrics: BTreeMap<String, MetricValue>,
    justifications: BTreeMap<String, MetricRank>,
}

#[derive(Debug, Serialize)]
struct ProbeReport {
    scenario: String,
    scene: String,
    probe: String,
    candidates: Vec<CandidateReport>,
}

fn brief(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

/// Perturb every injury severity with `N(0, sd)`, clamped to [0, 1].
fn perturb(state: &mut TriageState, noise: &Normal<f64>, rng: &mut StdRng) {
    for casualty in &mut state.casualties {
        for injury in &mut casualty.injuries {
            injury.severity = (injury.severity + noise.sample(rng)).clamp(0.0, 1.0);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, args.severity_noise.max(0.0))?;

    let config = SimulationConfig {
        rollouts: args.rollouts.max(1),
        max_depth: args.max_depth.max(1),
        use_failure_chance: args.failure_chance,
        ..SimulationConfig::default()
    };
    let file = ScenarioFile::load(&args.scenario_file)?;
    let mut analyzer = MonteCarloAnalyzer::new(config.clone());

    brief(&"=".repeat(60), args.quiet);
    brief("TRIAGE OUTCOME SIMULATION", args.quiet);
    brief(&format!("  Scenario file: {}", args.scenario_file.display()), args.quiet);
    brief(&format!("  Rollouts: {}  Depth: {}", config.rollouts, config.max_depth), args.quiet);
    brief(&format!("  Failure chance: {}", config.use_failure_chance), args.quiet);
    brief(&format!("  Severity noise: {:.3}", args.severity_noise), args.quiet);
    brief(&format!("  Random seed: {seed}"), args.quiet);
    brief(&"=".repeat(60), args.quiet);

    let mut reports = Vec::new();
    for scenario in &file.scenarios {
        if args.scenario.as_ref().is_some_and(|wanted| *wanted != scenario.id) {
            continue;
        }
        for scene in &scenario.scenes {
            for spec in &scene.probes {
                let mut state = spec.state.as_ref().unwrap_or(&scenario.state).to_internal();
                if args.severity_noise > 0.0 {
                    perturb(&mut state, &noise, &mut rng);
                }
                let grounded = ground_actions(&spec.actions, &state)?;
                let mut probe = Probe {
                    id: spec.id.clone(),
                    scene: scene.id.clone(),
                    prompt: state.unstructured.clone(),
                    state,
                    decisions: grounded.decisions,
                };
                analyzer.analyze(&mut probe, &mut rng)?;
                brief(
                    &format!("  {} / {} / {}: {} candidates", scenario.id, scene.id, probe.id, probe.decisions.len()),
                    args.quiet,
                );
                reports.push(ProbeReport {
                    scenario: scenario.id.clone(),
                    scene: scene.id.clone(),
                    probe: probe.id.clone(),
                    candidates: probe
                        .decisions
                        .into_iter()
                        .map(|d| CandidateReport {
                            id: d.id,
                            action: d.action.to_string(),
                            metrics: d.metrics,
                            justifications: d.justifications,
                        })
                        .collect(),
                });
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    brief(&format!("Analyzed {} probes", reports.len()), args.quiet);
    Ok(())
}
