use crate::contact::ContactPair;

use events::Target;
use model::bond::BondKey;

/// Conditions the core recovers from by itself. They are counted in the
/// diagnostics and logged, never returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Anomaly {
    #[error("trigger {seq} targets {target:?}, which does not exist")]
    UnknownFragmentTarget { seq: u64, target: Target },
    #[error("contact {pair:?} is still {depth} deep after solving; clamping velocities")]
    SolverDivergence { pair: ContactPair, depth: f32 },
    #[error("{active} bodies already active; bond {bond:?} made unbreakable")]
    BondCapReached { bond: BondKey, active: u32 },
}
