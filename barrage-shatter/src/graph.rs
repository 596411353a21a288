//! Turns labelled voxels into fragments and bonds.

use crate::{voxel::VoxelGrid, FractureGraph, MIN_MASS};

use model::{
    bond::{BondKind, BondTable},
    fragment::{CollisionShape, Fragment, FragmentId},
    geom::volume::SourceVolume,
};
use na::{Matrix3, Vector3};

use std::collections::BTreeMap;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

const OUTSIDE: u32 = u32::MAX;

pub struct Assembly<'a> {
    pub volume: &'a SourceVolume,
    pub grid: &'a VoxelGrid,
    pub samples: &'a [usize],
    /// Pattern label per sample.
    pub labels: &'a [u32],
    /// Labels per top level cell; label / per_cell gives the cell.
    pub per_cell: u32,
    pub toughness_scale: f32,
    pub min_fragment_volume: f32,
    pub gravity_factor: f32,
    pub requested: u32,
}

struct Component {
    label: u32,
    voxels: Vec<usize>,
    alive: bool,
}

impl<'a> Assembly<'a> {
    pub fn build(self) -> FractureGraph {
        let grid = self.grid;
        let mut label_of = vec![OUTSIDE; grid.len()];
        for (s, l) in self.samples.iter().zip(self.labels) {
            label_of[*s] = *l;
        }

        let (mut comp_of, mut comps) = flood(grid, &label_of);
        let voxel_volume = self.volume.measure() / self.samples.len() as f32;
        if self.min_fragment_volume > 0. {
            merge_small(
                grid,
                &mut comp_of,
                &mut comps,
                self.min_fragment_volume / voxel_volume,
            );
        }

        // dense ids in order of each fragment's first voxel
        let mut order: Vec<usize> = (0..comps.len()).filter(|c| comps[*c].alive).collect();
        for c in order.iter() {
            comps[*c].voxels.sort_unstable();
        }
        order.sort_by_key(|c| comps[*c].voxels[0]);
        let mut frag_of_comp = vec![OUTSIDE; comps.len()];
        for (f, c) in order.iter().enumerate() {
            frag_of_comp[*c] = f as u32;
        }

        let voxel_mass = self.volume.mass() / self.samples.len() as f32;
        let fragments: Vec<Fragment> = order
            .iter()
            .enumerate()
            .map(|(f, c)| {
                let comp = &comps[*c];
                self.fragment(
                    FragmentId(f as u32),
                    comp.label / self.per_cell,
                    &comp.voxels,
                    voxel_mass,
                    voxel_volume,
                )
            })
            .collect();

        let mut faces: BTreeMap<(u32, u32), u32> = BTreeMap::new();
        for &s in self.samples {
            let fa = frag_of_comp[comp_of[s] as usize];
            for n in grid.forward_neighbours(s) {
                if comp_of[n] == OUTSIDE {
                    continue;
                }
                let fb = frag_of_comp[comp_of[n] as usize];
                if fa != fb {
                    *faces.entry((fa.min(fb), fa.max(fb))).or_insert(0) += 1;
                }
            }
        }
        let face_area = grid.h * grid.h;
        let mut bonds = BondTable::new(fragments.len());
        for ((a, b), count) in faces {
            let (fa, fb) = (&fragments[a as usize], &fragments[b as usize]);
            let area = count as f32 * face_area;
            let (kind, scale) = if self.per_cell > 1 && fa.cell == fb.cell {
                (BondKind::Intracell, self.toughness_scale)
            } else {
                (BondKind::Intercell, 1.)
            };
            bonds.insert(
                fa.id,
                fb.id,
                kind,
                area,
                self.volume.toughness * area * scale,
            );
        }

        debug!(
            "Carved {} requested cells into {} fragments with {} bonds.",
            self.requested,
            fragments.len(),
            bonds.len()
        );
        FractureGraph {
            fragments,
            bonds,
            voxel_size: grid.h,
            cell_count: self.requested,
        }
    }

    fn fragment(
        &self,
        id: FragmentId,
        cell: u32,
        voxels: &[usize],
        voxel_mass: f32,
        voxel_volume: f32,
    ) -> Fragment {
        let grid = self.grid;
        let k = voxels.len() as f32;
        let centroid = voxels
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + grid.center(*v))
            / k;
        let mut inertia = Matrix3::zeros();
        let mut reach: f32 = 0.;
        for v in voxels {
            let r = grid.center(*v) - centroid;
            inertia += Matrix3::from_diagonal_element(r.norm_squared()) - r * r.transpose();
            reach = reach.max(r.norm());
        }
        // every voxel is a small cube about its own center
        inertia += Matrix3::from_diagonal_element(k * grid.h * grid.h / 6.);
        inertia *= voxel_mass;

        let volume = k * voxel_volume;
        let radius = (3. * volume / (4. * std::f32::consts::PI)).cbrt();
        Fragment {
            id,
            cell,
            mass: (k * voxel_mass).max(MIN_MASS),
            volume,
            inertia,
            centroid,
            shape: CollisionShape {
                radius,
                bounding_radius: reach + grid.h * 3f32.sqrt() * 0.5,
            },
            gravity_factor: self.gravity_factor,
        }
    }
}

/// Face connected runs of equal labels, discovered in voxel index order.
fn flood(grid: &VoxelGrid, label_of: &[u32]) -> (Vec<u32>, Vec<Component>) {
    let mut comp_of = vec![OUTSIDE; grid.len()];
    let mut comps = vec![];
    let mut stack = vec![];
    for start in 0..grid.len() {
        if label_of[start] == OUTSIDE || comp_of[start] != OUTSIDE {
            continue;
        }
        let id = comps.len() as u32;
        let label = label_of[start];
        let mut voxels = vec![];
        comp_of[start] = id;
        stack.push(start);
        while let Some(v) = stack.pop() {
            voxels.push(v);
            for n in grid.neighbours(v) {
                if label_of[n] == label && comp_of[n] == OUTSIDE {
                    comp_of[n] = id;
                    stack.push(n);
                }
            }
        }
        comps.push(Component {
            label,
            voxels,
            alive: true,
        });
    }
    (comp_of, comps)
}

/// Folds undersized components, smallest first, into the neighbour they
/// share the most faces with. Ties go to the lower component.
fn merge_small(grid: &VoxelGrid, comp_of: &mut [u32], comps: &mut [Component], min_voxels: f32) {
    let mut stranded = vec![false; comps.len()];
    loop {
        let alive = comps.iter().filter(|c| c.alive).count();
        if alive <= 1 {
            return;
        }
        let small = comps
            .iter()
            .enumerate()
            .filter(|(i, c)| c.alive && !stranded[*i] && (c.voxels.len() as f32) < min_voxels)
            .min_by_key(|(i, c)| (c.voxels.len(), *i))
            .map(|(i, _)| i);
        let Some(small) = small else {
            return;
        };

        let mut contact: BTreeMap<u32, u32> = BTreeMap::new();
        for v in comps[small].voxels.iter() {
            for n in grid.neighbours(*v) {
                let other = comp_of[n];
                if other != OUTSIDE && other as usize != small {
                    *contact.entry(other).or_insert(0) += 1;
                }
            }
        }
        let mut target = None;
        let mut most = 0;
        for (c, count) in contact {
            if count > most {
                most = count;
                target = Some(c as usize);
            }
        }
        let Some(target) = target else {
            // an island with nothing to merge into stays as it is
            stranded[small] = true;
            continue;
        };

        trace!(
            "Merging component {} ({} voxels) into {}.",
            small,
            comps[small].voxels.len(),
            target
        );
        let moved = std::mem::take(&mut comps[small].voxels);
        for v in moved.iter() {
            comp_of[*v] = target as u32;
        }
        comps[target].voxels.extend(moved);
        comps[small].alive = false;
    }
}
