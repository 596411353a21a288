use serde::{Deserialize, Serialize};

/// Tuning for one simulation instance. Every field has a usable default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Seconds per tick.
    pub tick_duration: f32,
    pub substeps: u32,
    pub solver_iterations: u32,
    pub gravity: [f32; 3],
    /// Speed below which a body counts as resting.
    pub rest_speed: f32,
    /// Consecutive resting ticks before a body sleeps.
    pub rest_ticks: u32,
    /// Impulse needed to wake a sleeping body.
    pub wake_threshold: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    /// Closing speed below which contacts don't bounce.
    pub restitution_speed: f32,
    pub friction: f32,
    /// Fraction of penetration corrected per step.
    pub baumgarte: f32,
    /// Penetration left alone.
    pub slop: f32,
    /// Fraction of bond stress kept from one tick to the next.
    pub stress_decay: f32,
    pub divergence_depth: f32,
    pub divergence_speed: f32,
    pub max_active_bodies: u32,
    pub world_bounds: WorldBounds,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_duration: 1. / 60.,
            substeps: 4,
            solver_iterations: 8,
            gravity: [0., -9.81, 0.],
            rest_speed: 0.05,
            rest_ticks: 30,
            wake_threshold: 0.05,
            linear_damping: 0.01,
            angular_damping: 0.05,
            restitution: 0.2,
            restitution_speed: 1.,
            friction: 0.5,
            baumgarte: 0.2,
            slop: 0.005,
            stress_decay: 0.5,
            divergence_depth: 0.5,
            divergence_speed: 50.,
            max_active_bodies: 4096,
            world_bounds: WorldBounds::default(),
        }
    }
}

impl SimConfig {
    pub fn substep(&self) -> f32 {
        self.tick_duration / self.substeps.max(1) as f32
    }
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = [0.; 3];
        self
    }
}

/// Fragments whose centroid leaves this box become inert.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}
impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min: [-1000.; 3],
            max: [1000.; 3],
        }
    }
}

/// `normal · p = offset`, solid on the side opposite the normal.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneDef {
    pub normal: [f32; 3],
    #[serde(default)]
    pub offset: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxDef {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Static world geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub planes: Vec<PlaneDef>,
    pub boxes: Vec<BoxDef>,
}
impl EnvConfig {
    pub fn floor(height: f32) -> Self {
        Self {
            planes: vec![PlaneDef {
                normal: [0., 1., 0.],
                offset: height,
            }],
            boxes: vec![],
        }
    }
}
