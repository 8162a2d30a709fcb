//! System-wide default constants.
//!
//! Medical model rates, morbidity bands, search parameters and estimator
//! tuning. Grouped by subsystem; the per-supply and per-action tables that
//! key off enum variants live in `medsim::tables`.

// ============================================================================
// Damage rates (per second, by effect level)
// ============================================================================

pub const DAMAGE_RATE_NONE: f64 = 0.0;
pub const DAMAGE_RATE_MINIMAL: f64 = 0.5;
pub const DAMAGE_RATE_MODERATE: f64 = 1.5;
pub const DAMAGE_RATE_SEVERE: f64 = 10.0;
pub const DAMAGE_RATE_CRITICAL: f64 = 50.0;
/// Effectively instantaneous exsanguination.
pub const DAMAGE_RATE_FATAL: f64 = 9001.0;

/// Divisor applied to an injury's rate during the action that treats it.
pub const TREATING_STEP_RATE_DIVISOR: f64 = 4.0;

// ============================================================================
// Healing (one-shot credits applied over the administering action)
// ============================================================================

/// Blood transfusion, ml restored per second of administration.
pub const BLOOD_HEAL_ML_PER_SEC: f64 = 16.7;

/// IV fluids, ml restored per second of administration.
pub const IV_HEAL_ML_PER_SEC: f64 = 10.0;

/// Airway, breathing hp restored per second of insertion.
pub const NASO_HEAL_HP_PER_SEC: f64 = 5.0;

/// Pain medication, restored per second on blood and breathing channels.
pub const PAINMED_HEAL_PER_SEC: f64 = 1.0;

// ============================================================================
// Morbidity
// ============================================================================

/// Loss at which a channel is considered total (ml for blood, hp otherwise).
pub const MAX_CHANNEL_LOSS: f64 = 5_000.0;

/// Upper edges of the morbidity bands, as a fraction of `MAX_CHANNEL_LOSS`.
pub const MORBIDITY_BAND_EDGES: [f64; 4] = [0.15, 0.30, 0.40, 0.50];

/// Probability assigned inside each band; the last entry applies above every edge.
pub const MORBIDITY_BAND_PROBABILITIES: [f64; 5] = [0.0, 0.1, 0.5, 0.75, 0.999];

/// Loss that adds one full unit of injury severity.
pub const SEVERITY_LOSS_DIVISOR: f64 = 500.0;

/// Horizon for the projected death probability metric (seconds).
pub const P_DEATH_PROJECTION_SECS: f64 = 60.0;

// ============================================================================
// Time
// ============================================================================

/// Aid delay assumed when the state does not report one (seconds).
///
/// END_SCENE and END_SCENARIO advance the clock by the aid delay.
pub const DEFAULT_AID_DELAY_SECS: f64 = 300.0;

/// Smallest time step any action may take (seconds).
pub const MIN_ACTION_SECS: f64 = 1.0;

// ============================================================================
// Monte Carlo search
// ============================================================================

pub const DEFAULT_ROLLOUTS: usize = 500;

/// Depth 2 simulates each root decision exactly once per visit.
pub const DEFAULT_MAX_DEPTH: usize = 2;

// ============================================================================
// Case-based estimator
// ============================================================================

/// Neighbours used per KDMA estimate.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 4;

/// Squared-distance penalty added when a KDMA cannot be estimated.
pub const MISSING_ESTIMATE_PENALTY: f64 = 100.0;

/// Floor on neighbour distance when computing similarity weights.
pub const MIN_NEIGHBOR_DISTANCE: f64 = 0.01;

/// Starting cutoff for neighbour retrieval.
pub const INITIAL_MAX_DISTANCE: f64 = 10_000.0;

/// Cases closer than `kth * GUARANTEE_BAND` are always kept.
pub const GUARANTEE_BAND: f64 = 0.99;

/// Cases within `kth * TIE_BAND` compete for the remaining slots.
pub const TIE_BAND: f64 = 1.01;

/// Weight on the KDMA itself when diversifying tied neighbours.
pub const DIVERSITY_KDMA_WEIGHT: f64 = 10.0;

// ============================================================================
// Storage
// ============================================================================

pub const DEFAULT_CASE_BASE_PATH: &str = "case_base.jsonl";

pub const DEFAULT_ADM_NAME: &str = "triage-adm";
