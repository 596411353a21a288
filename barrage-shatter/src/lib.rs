//! # Fracture graph builder
//!
//! Carves a [`SourceVolume`] into fragments and the bonds holding them
//! together. Runs once per asset, before any simulation.
//!
//! The volume is sampled on a voxel lattice. A pattern labels each inside
//! voxel with a cell, runs of equal labels become fragments, and every face
//! shared by two fragments contributes to the bond between them. The same
//! volume and config always produce the same graph.

extern crate barrage_model as model;
extern crate nalgebra as na;

pub mod config;
mod graph;
mod pattern;
mod voxel;

pub use config::{FractureConfig, PatternKind, Subdivision};

use model::{
    bond::BondTable,
    fragment::{sphere_inertia, CollisionShape, Fragment, FragmentId},
    geom::volume::{SourceVolume, VolumeShape},
};
use na::{Matrix3, Vector3};
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use std::collections::BTreeMap;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Floor for fragment mass so that every fragment stays simulable.
pub const MIN_MASS: f32 = 1e-3;
const MIN_RADIUS: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub struct FractureGraph {
    /// Indexed by `FragmentId`.
    pub fragments: Vec<Fragment>,
    pub bonds: BondTable,
    /// Edge length of the sampling voxel.
    pub voxel_size: f32,
    /// Cells asked for across every hierarchy level.
    pub cell_count: u32,
}

impl FractureGraph {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
    pub fn fragment(&self, id: FragmentId) -> Option<&Fragment> {
        self.fragments.get(id.index())
    }
    pub fn total_mass(&self) -> f32 {
        self.fragments.iter().map(|f| f.mass).sum()
    }
    /// Mass weighted centroid of every fragment.
    pub fn centroid(&self) -> Vector3<f32> {
        let m = self.total_mass();
        if m <= 0. {
            return Vector3::zeros();
        }
        self.fragments
            .iter()
            .fold(Vector3::zeros(), |acc, f| acc + f.centroid * f.mass)
            / m
    }
}

#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum Degeneracy {
    #[error("the volume has zero measure")]
    ZeroMeasure,
    #[error("no voxel center falls inside the volume at resolution {0}")]
    NoSamples(u32),
    #[error("zero cells requested")]
    NoCells,
    #[error("{cells} cells of at least {min_volume} do not fit in a volume of {volume}")]
    MinVolume {
        cells: u32,
        min_volume: f32,
        volume: f32,
    },
    #[error("{cells} cells requested from only {samples} samples")]
    TooFewSamples { cells: u32, samples: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum FractureError {
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        reason: Degeneracy,
        /// The volume as one unfractured fragment.
        fallback: Box<FractureGraph>,
    },
}
impl FractureError {
    pub fn reason(&self) -> Degeneracy {
        match self {
            FractureError::DegenerateGeometry { reason, .. } => *reason,
        }
    }
    pub fn into_fallback(self) -> FractureGraph {
        match self {
            FractureError::DegenerateGeometry { fallback, .. } => *fallback,
        }
    }
}

pub fn shatter(volume: &SourceVolume, cfg: &FractureConfig) -> Result<FractureGraph, FractureError> {
    let degenerate = |reason| FractureError::DegenerateGeometry {
        reason,
        fallback: Box::new(whole(volume, cfg)),
    };

    let measure = volume.measure();
    if !(measure > 0.) {
        return Err(degenerate(Degeneracy::ZeroMeasure));
    }
    let sub_cells = cfg.subdivision.as_ref().map_or(1, |s| s.cell_count);
    if cfg.cell_count == 0 || sub_cells == 0 {
        return Err(degenerate(Degeneracy::NoCells));
    }
    let total = cfg.total_cells();
    if total as f32 * cfg.min_fragment_volume > measure {
        return Err(degenerate(Degeneracy::MinVolume {
            cells: total,
            min_volume: cfg.min_fragment_volume,
            volume: measure,
        }));
    }
    let grid = voxel::VoxelGrid::sample(volume, cfg.resolution)
        .ok_or_else(|| degenerate(Degeneracy::ZeroMeasure))?;
    let samples = grid.samples();
    if samples.is_empty() {
        return Err(degenerate(Degeneracy::NoSamples(cfg.resolution)));
    }
    // every label in `0..cell_count * sub_cells` must name at least one sample
    let fits = cfg
        .cell_count
        .checked_mul(sub_cells)
        .map_or(false, |total| total as usize <= samples.len());
    if !fits {
        return Err(degenerate(Degeneracy::TooFewSamples {
            cells: total,
            samples: samples.len(),
        }));
    }

    let mut rng = Pcg64Mcg::seed_from_u64(cfg.seed);
    let top = pattern::Pattern {
        kind: cfg.pattern,
        cells: cfg.cell_count,
        rings: cfg.radial_rings,
        center: cfg.radial_center.map(Vector3::from),
    }
    .label(&grid, &samples, &mut rng);

    let (labels, per_cell, toughness_scale) = match &cfg.subdivision {
        None => (top, 1, 1.),
        Some(sub) => (
            subdivide(&grid, &samples, &top, sub, cfg.radial_rings, &mut rng),
            sub.cell_count,
            sub.toughness_scale,
        ),
    };

    Ok(graph::Assembly {
        volume,
        grid: &grid,
        samples: &samples,
        labels: &labels,
        per_cell,
        toughness_scale,
        min_fragment_volume: cfg.min_fragment_volume,
        gravity_factor: cfg.gravity_factor,
        requested: total,
    }
    .build())
}

/// Like [`shatter`], but degenerate input falls back to the whole volume as
/// a single fragment.
pub fn shatter_or_whole(volume: &SourceVolume, cfg: &FractureConfig) -> FractureGraph {
    match shatter(volume, cfg) {
        Ok(graph) => graph,
        Err(e) => {
            warn!("{}; simulating the volume unfractured.", e);
            e.into_fallback()
        }
    }
}

/// Carves every top level cell again, in ascending cell order.
fn subdivide(
    grid: &voxel::VoxelGrid,
    samples: &[usize],
    top: &[u32],
    sub: &Subdivision,
    rings: u32,
    rng: &mut Pcg64Mcg,
) -> Vec<u32> {
    let mut cells: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, l) in top.iter().enumerate() {
        cells.entry(*l).or_default().push(i);
    }
    let pattern = pattern::Pattern {
        kind: sub.pattern,
        cells: sub.cell_count,
        rings,
        center: None,
    };
    let mut labels = vec![0; samples.len()];
    for (cell, members) in cells {
        let local: Vec<usize> = members.iter().map(|i| samples[*i]).collect();
        let sub_labels = pattern.label(grid, &local, rng);
        for (i, l) in members.into_iter().zip(sub_labels) {
            labels[i] = cell * sub.cell_count + l;
        }
    }
    labels
}

/// The volume as one fragment.
fn whole(volume: &SourceVolume, cfg: &FractureConfig) -> FractureGraph {
    let measure = volume.measure();
    let mass = volume.mass();
    let mass = if mass.is_finite() { mass.max(MIN_MASS) } else { MIN_MASS };
    let bounds = volume.bounds();
    let (centroid, half) = if bounds.is_empty() || !bounds.extents().iter().all(|e| e.is_finite()) {
        (Vector3::zeros(), Vector3::zeros())
    } else {
        (bounds.center(), bounds.extents() * 0.5)
    };
    let radius = if measure > 0. {
        (3. * measure / (4. * std::f32::consts::PI)).cbrt()
    } else {
        half.max().max(MIN_RADIUS)
    };

    let inertia = match &volume.shape {
        VolumeShape::Sphere { .. } => sphere_inertia(mass, radius),
        _ => {
            let e = half * 2.;
            let (x, y, z) = (e.x * e.x, e.y * e.y, e.z * e.z);
            let i = Matrix3::from_diagonal(&Vector3::new(y + z, x + z, x + y)) * (mass / 12.);
            if i.diagonal().iter().all(|d| *d > 0.) {
                i
            } else {
                sphere_inertia(mass, radius)
            }
        }
    };

    let mut fragments = vec![Fragment {
        id: FragmentId(0),
        cell: 0,
        mass,
        volume: measure.max(0.),
        inertia,
        centroid,
        shape: CollisionShape {
            radius,
            bounding_radius: half.norm().max(radius),
        },
        gravity_factor: cfg.gravity_factor,
    }];
    fragments.shrink_to_fit();
    FractureGraph {
        fragments,
        bonds: BondTable::new(1),
        voxel_size: (half.max() * 2.).max(MIN_RADIUS),
        cell_count: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use model::{bond::BondKind, geom::tri::unit_cube};
    use std::collections::BTreeSet;

    fn cube() -> SourceVolume {
        SourceVolume::cuboid(Vector3::repeat(0.5))
    }

    fn grid_cube() -> FractureGraph {
        let cfg = FractureConfig::new(PatternKind::UniformGrid, 10).with_resolution(20);
        shatter(&cube(), &cfg).unwrap()
    }

    #[test]
    fn uniform_grid_cube_layout() {
        let g = grid_cube();
        assert_eq!(g.len(), 10);
        assert_eq!(g.bonds.len(), 13);
        for f in g.fragments.iter() {
            assert_relative_eq!(f.mass, 0.1, epsilon = 1e-5);
        }
        // first voxel is the (-, -, -) corner
        let corner = &g.fragments[0];
        assert_relative_eq!(corner.centroid, Vector3::new(0., -0.25, -0.4), epsilon = 1e-5);
        assert_eq!(g.bonds.bonds_of(FragmentId(0)).len(), 2);
        let b = g.bonds.bond(g.bonds.bonds_of(FragmentId(0))[0]);
        assert_eq!(b.kind, BondKind::Intercell);
        assert!(b.contact_area > 0.);
        assert_relative_eq!(b.strength, cube().toughness * b.contact_area);
    }

    #[test]
    fn mass_matches_the_volume() {
        let v = SourceVolume::sphere(1.).with_density(3.);
        let cfg = FractureConfig::new(PatternKind::Voronoi, 12).with_seed(9);
        let g = shatter(&v, &cfg).unwrap();
        assert_relative_eq!(g.total_mass(), v.mass(), max_relative = 1e-4);
        assert_relative_eq!(g.centroid(), Vector3::zeros(), epsilon = 0.05);
    }

    #[test]
    fn identical_input_gives_identical_graph() {
        let cfg = FractureConfig::new(PatternKind::Voronoi, 8).with_seed(42);
        let a = shatter(&cube(), &cfg).unwrap();
        let b = shatter(&cube(), &cfg).unwrap();
        assert_eq!(a, b);
        for (x, y) in a.fragments.iter().zip(b.fragments.iter()) {
            assert_eq!(x.mass.to_bits(), y.mass.to_bits());
            assert_eq!(x.centroid.x.to_bits(), y.centroid.x.to_bits());
        }
    }

    #[test]
    fn ids_are_dense_and_cover_every_bond() {
        let cfg = FractureConfig::new(PatternKind::Radial, 6).with_seed(1);
        let g = shatter(&SourceVolume::sphere(2.), &cfg).unwrap();
        for (i, f) in g.fragments.iter().enumerate() {
            assert_eq!(f.id, FragmentId(i as u32));
        }
        for (_, b) in g.bonds.iter() {
            assert!(b.key.b().index() < g.len());
            assert_ne!(b.key.a(), b.key.b());
        }
    }

    #[test]
    fn zero_volume_falls_back_to_one_fragment() {
        let flat = SourceVolume::cuboid(Vector3::new(1., 0., 1.));
        let cfg = FractureConfig::default();
        let err = shatter(&flat, &cfg).unwrap_err();
        assert_eq!(err.reason(), Degeneracy::ZeroMeasure);
        let g = err.into_fallback();
        assert_eq!(g.len(), 1);
        assert!(g.bonds.is_empty());
        assert!(g.fragments[0].mass >= MIN_MASS);

        let g = shatter_or_whole(&flat, &cfg);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn impossible_requests_are_degenerate() {
        let zero = FractureConfig::new(PatternKind::Voronoi, 0);
        assert_eq!(shatter(&cube(), &zero).unwrap_err().reason(), Degeneracy::NoCells);

        let big = FractureConfig::new(PatternKind::Voronoi, 4).with_min_fragment_volume(0.5);
        assert!(matches!(
            shatter(&cube(), &big).unwrap_err().reason(),
            Degeneracy::MinVolume { cells: 4, .. }
        ));

        let many = FractureConfig::new(PatternKind::Voronoi, 100).with_resolution(2);
        assert_eq!(
            shatter(&cube(), &many).unwrap_err().reason(),
            Degeneracy::TooFewSamples {
                cells: 100,
                samples: 8
            }
        );

        let sub = |cell_count| Subdivision {
            pattern: PatternKind::UniformGrid,
            cell_count,
            toughness_scale: 1.,
        };
        let overflow = FractureConfig::new(PatternKind::UniformGrid, 2)
            .with_resolution(8)
            .with_subdivision(sub(u32::MAX));
        let err = shatter(&cube(), &overflow).unwrap_err();
        assert_eq!(
            err.reason(),
            Degeneracy::TooFewSamples {
                cells: u32::MAX,
                samples: 512
            }
        );
        assert_eq!(err.into_fallback().len(), 1);

        let crowded = FractureConfig::new(PatternKind::UniformGrid, 4)
            .with_resolution(4)
            .with_subdivision(sub(20));
        assert!(matches!(
            shatter(&cube(), &crowded).unwrap_err().reason(),
            Degeneracy::TooFewSamples { cells: 80, samples: 64 }
        ));
    }

    #[test]
    fn undersized_cells_merge_away() {
        let loose = FractureConfig::new(PatternKind::Voronoi, 20).with_seed(5);
        let merged = loose.clone().with_min_fragment_volume(0.04);
        let a = shatter(&cube(), &loose).unwrap();
        let b = shatter(&cube(), &merged).unwrap();
        assert!(b.len() <= a.len());
        assert!(b.fragments.iter().all(|f| f.volume >= 0.04 - 1e-4));
        assert_relative_eq!(a.total_mass(), b.total_mass(), max_relative = 1e-4);
    }

    #[test]
    fn subdivision_marks_intracell_bonds() {
        let cfg = FractureConfig::new(PatternKind::UniformGrid, 2)
            .with_resolution(16)
            .with_subdivision(Subdivision {
                pattern: PatternKind::UniformGrid,
                cell_count: 2,
                toughness_scale: 3.,
            });
        let g = shatter(&cube(), &cfg).unwrap();
        assert_eq!(g.len(), 4);
        assert_eq!(g.cell_count, 4);
        let cells: BTreeSet<u32> = g.fragments.iter().map(|f| f.cell).collect();
        assert_eq!(cells.len(), 2);
        let intra: Vec<_> = g
            .bonds
            .iter()
            .filter(|(_, b)| b.kind == BondKind::Intracell)
            .collect();
        assert!(!intra.is_empty());
        for (_, b) in intra {
            assert_relative_eq!(b.strength, 3. * cube().toughness * b.contact_area, max_relative = 1e-5);
        }
    }

    #[test]
    fn meshes_shatter_like_cuboids() {
        let cfg = FractureConfig::new(PatternKind::UniformGrid, 10).with_resolution(20);
        let mesh = shatter(&SourceVolume::mesh(unit_cube()), &cfg).unwrap();
        assert_eq!(mesh.len(), grid_cube().len());
    }
}
