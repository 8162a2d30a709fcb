//! Case-based KDMA estimation
//!
//! - `case`: the feature record built for each candidate decision
//! - `distance`: weighted per-feature dissimilarity
//! - `retrieval`: top-K neighbours with action-class filters and tie diversification
//! - `estimate`: distance-weighted prediction and the leave-one-out diagnostic

pub mod case;
pub mod distance;
pub mod estimate;
pub mod retrieval;

pub use case::{Case, CaseFeatures};
pub use distance::{compare, distance, FeatureValue};
pub use estimate::{estimate_kdma, leave_one_out_error, Estimate};
pub use retrieval::{compatible, construct_distanced_list, top_k, Neighbor};
