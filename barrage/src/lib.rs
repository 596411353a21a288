//! # Barrage
//!
//! Procedural fracture and debris simulation. A [`SourceVolume`] is shattered
//! once into bonded fragments, then simulated at a fixed tick rate on its own
//! thread. Callers push triggers through a [`Submitter`] and read every
//! fragment's pose back through a [`PoseReader`] without ever blocking the
//! simulation.

extern crate barrage_events as events;
extern crate barrage_model as model;
extern crate barrage_shatter as shatter;
extern crate barrage_sim as sim;
extern crate barrage_sync as sync;
extern crate barrage_threading as th;
extern crate nalgebra as na;

pub mod config;
mod instance;

pub use config::{ConfigError, DispatcherConfig, InstanceConfig};
pub use instance::{Barrage, InstanceError, PoseReader, Stepper};

pub use events::{DispatchError, Region, RegionId, Submitter, Target, TriggerEvent, TriggerKind};
pub use model::{
    fragment::{FragmentId, FragmentState},
    geom::volume::SourceVolume,
    pose::{Diagnostics, PoseEntry, PoseSnapshot},
    Pose,
};
pub use shatter::config::{FractureConfig, PatternKind, Subdivision};
pub use sim::{ContactEvent, ContactPair, ContactPhase, EnvConfig, Other, SimConfig, Simulation};
pub use th::KillSwitch;

/// Vector type used throughout the public API.
pub type Vec3 = na::Vector3<f32>;
