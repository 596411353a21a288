//! Cell labelling. Each pattern assigns every sampled voxel a label in
//! `0..cells`; labels need not all be used.

use crate::{config::PatternKind, voxel::VoxelGrid};

use na::Vector3;
use rand::Rng;
use rand_pcg::Pcg64Mcg;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

pub struct Pattern {
    pub kind: PatternKind,
    pub cells: u32,
    pub rings: u32,
    pub center: Option<Vector3<f32>>,
}

impl Pattern {
    /// Labels `samples`, returning one label per sample in the same order.
    pub fn label(&self, grid: &VoxelGrid, samples: &[usize], rng: &mut Pcg64Mcg) -> Vec<u32> {
        let cells = (self.cells as usize).min(samples.len()).max(1) as u32;
        if cells == 1 {
            return vec![0; samples.len()];
        }
        match self.kind {
            PatternKind::Voronoi => voronoi(grid, samples, cells, rng),
            PatternKind::UniformGrid => uniform_grid(grid, samples, cells),
            PatternKind::Radial => radial(grid, samples, cells, self.rings, self.center, rng),
        }
    }
}

/// Distinct seeds drawn by a partial Fisher-Yates shuffle over the samples.
fn voronoi(grid: &VoxelGrid, samples: &[usize], cells: u32, rng: &mut Pcg64Mcg) -> Vec<u32> {
    let mut pool = samples.to_vec();
    let n = cells as usize;
    for i in 0..n {
        let j = rng.gen_range(i..pool.len());
        pool.swap(i, j);
    }
    let seeds: Vec<Vector3<f32>> = pool[..n].iter().map(|s| grid.center(*s)).collect();

    samples
        .iter()
        .map(|s| {
            let p = grid.center(*s);
            let mut best = 0;
            let mut best_d = f32::INFINITY;
            for (i, seed) in seeds.iter().enumerate() {
                let d = (p - seed).norm_squared();
                // strict compare keeps the lower seed on ties
                if d < best_d {
                    best_d = d;
                    best = i;
                }
            }
            best as u32
        })
        .collect()
}

/// Per-axis cell counts whose product is `cells`, chosen so the cells are as
/// close to cubes as the box allows.
pub fn factorise(cells: u32, extents: &Vector3<f32>) -> [u32; 3] {
    let e = extents.map(|v| v.max(f32::EPSILON));
    let mut best = [cells, 1, 1];
    let mut best_ratio = f32::INFINITY;
    for a in 1..=cells {
        if cells % a != 0 {
            continue;
        }
        let rest = cells / a;
        for b in 1..=rest {
            if rest % b != 0 {
                continue;
            }
            let c = rest / b;
            let size = [e.x / a as f32, e.y / b as f32, e.z / c as f32];
            let hi = size.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            let lo = size.iter().cloned().fold(f32::INFINITY, f32::min);
            let ratio = hi / lo;
            if ratio < best_ratio {
                best_ratio = ratio;
                best = [a, b, c];
            }
        }
    }
    best
}

fn uniform_grid(grid: &VoxelGrid, samples: &[usize], cells: u32) -> Vec<u32> {
    let bounds = grid.bounds_of(samples);
    let extents = bounds.extents();
    let split = factorise(cells, &extents);
    samples
        .iter()
        .map(|s| {
            let rel = grid.center(*s) - bounds.min;
            let mut idx = [0u32; 3];
            for i in 0..3 {
                let size = extents[i] / split[i] as f32;
                let k = if size > 0. { (rel[i] / size).floor() } else { 0. };
                idx[i] = (k.max(0.) as u32).min(split[i] - 1);
            }
            idx[0] + split[0] * (idx[1] + split[1] * idx[2])
        })
        .collect()
}

fn radial(
    grid: &VoxelGrid,
    samples: &[usize],
    cells: u32,
    rings: u32,
    center: Option<Vector3<f32>>,
    rng: &mut Pcg64Mcg,
) -> Vec<u32> {
    use std::f32::consts::TAU;

    let rings = rings.clamp(1, cells);
    let sectors = (cells + rings - 1) / rings;
    let center = center.unwrap_or_else(|| {
        let sum = samples
            .iter()
            .fold(Vector3::zeros(), |acc, s| acc + grid.center(*s));
        sum / samples.len() as f32
    });
    let offset: f32 = rng.gen_range(0.0..TAU);

    let planar: Vec<(f32, f32)> = samples
        .iter()
        .map(|s| {
            let d = grid.center(*s) - center;
            ((d.x * d.x + d.z * d.z).sqrt(), d.z.atan2(d.x))
        })
        .collect();
    let reach = planar.iter().map(|(r, _)| *r).fold(0., f32::max);
    let wedge = TAU / sectors as f32;

    planar
        .into_iter()
        .map(|(r, theta)| {
            let ring = if reach > 0. {
                ((r / reach * rings as f32) as u32).min(rings - 1)
            } else {
                0
            };
            let a = (theta + offset).rem_euclid(TAU);
            let sector = ((a / wedge) as u32).min(sectors - 1);
            (ring * sectors + sector).min(cells - 1)
        })
        .collect()
}
