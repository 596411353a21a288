//! # Event / trigger dispatcher
//!
//! Any thread may submit triggers through a [`Submitter`]. The simulation
//! thread owns the matching [`EventQueue`] and drains it once per tick, so
//! triggers never touch simulation state directly.

extern crate barrage_model as model;
extern crate nalgebra as na;

pub mod queue;
pub mod region;

pub use queue::{channel, DispatchError, EventQueue, Submitter};
pub use region::{spread, FragmentImpulse, Region, RegionId, RegionMap};

use model::fragment::FragmentId;
use na::Vector3;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Target {
    Fragment(FragmentId),
    /// A configured region, looked up when the event is applied.
    Region(RegionId),
    /// Every fragment within `radius` of `center`.
    Sphere { center: Vector3<f32>, radius: f32 },
}

#[derive(Debug, Hash, Copy, Clone, PartialEq, Eq)]
pub enum TriggerKind {
    Impact,
    Damage,
    Scripted,
    Timer,
}

/// A trigger as the simulation sees it. For area targets only the
/// magnitude of `impulse` is used; each struck fragment is pushed away from
/// the area's center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TriggerEvent {
    pub target: Target,
    pub impulse: Vector3<f32>,
    /// Caller supplied time, in seconds. Informational only.
    pub timestamp: f64,
    pub kind: TriggerKind,
    /// Submission order across every submitter of one queue.
    pub seq: u64,
}

impl TriggerEvent {
    pub fn magnitude(&self) -> f32 {
        self.impulse.norm()
    }
}
