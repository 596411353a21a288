use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    /// Nearest-seed cells around seeds scattered through the volume.
    #[default]
    Voronoi,
    /// Axis aligned slabs, factorised to match the bounding box.
    UniformGrid,
    /// Rings and angular wedges around a vertical axis.
    Radial,
}

/// Second hierarchy level: every top level cell is carved again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subdivision {
    pub pattern: PatternKind,
    pub cell_count: u32,
    /// Multiplies the strength of bonds inside one top level cell.
    #[serde(default = "default_toughness_scale")]
    pub toughness_scale: f32,
}
fn default_toughness_scale() -> f32 {
    2.
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FractureConfig {
    pub pattern: PatternKind,
    /// Target; the builder may return fewer after merging undersized cells.
    pub cell_count: u32,
    pub seed: u64,
    pub min_fragment_volume: f32,
    /// Voxel samples along the longest axis of the volume's bounds.
    pub resolution: u32,
    pub radial_rings: u32,
    /// Defaults to the volume's sampled centroid.
    pub radial_center: Option<[f32; 3]>,
    pub subdivision: Option<Subdivision>,
    pub gravity_factor: f32,
}
impl Default for FractureConfig {
    fn default() -> Self {
        Self {
            pattern: PatternKind::Voronoi,
            cell_count: 16,
            seed: 0,
            min_fragment_volume: 0.,
            resolution: 32,
            radial_rings: 2,
            radial_center: None,
            subdivision: None,
            gravity_factor: 1.,
        }
    }
}
impl FractureConfig {
    pub fn new(pattern: PatternKind, cell_count: u32) -> Self {
        Self {
            pattern,
            cell_count,
            ..Default::default()
        }
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }
    pub fn with_min_fragment_volume(mut self, v: f32) -> Self {
        self.min_fragment_volume = v;
        self
    }
    pub fn with_subdivision(mut self, sub: Subdivision) -> Self {
        self.subdivision = Some(sub);
        self
    }
    /// Cells requested across every hierarchy level.
    pub fn total_cells(&self) -> u32 {
        let sub = self.subdivision.as_ref().map_or(1, |s| s.cell_count);
        self.cell_count.saturating_mul(sub)
    }
}
