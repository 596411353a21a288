use model::geom::{volume::SourceVolume, Aabb};
use na::Vector3;

/// Regular lattice over a volume's bounds, marking voxels whose center lies
/// inside the solid.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    pub origin: Vector3<f32>,
    pub h: f32,
    pub dims: [usize; 3],
    pub inside: Vec<bool>,
}

impl VoxelGrid {
    /// `None` when the bounds have no usable extent.
    pub fn sample(volume: &SourceVolume, resolution: u32) -> Option<VoxelGrid> {
        let b = volume.bounds();
        let e = b.extents();
        let longest = e.max();
        if b.is_empty() || !longest.is_finite() || longest <= 0. {
            return None;
        }
        let h = longest / resolution.max(1) as f32;
        // shave a hair so exact multiples of h don't grow a sliver layer
        let dims = [0, 1, 2].map(|i| (((e[i] / h) - 1e-3).ceil() as usize).max(1));
        let span = Vector3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32) * h;
        let origin = b.center() - span * 0.5;
        let mut grid = VoxelGrid {
            origin,
            h,
            dims,
            inside: vec![false; dims[0] * dims[1] * dims[2]],
        };
        for idx in 0..grid.len() {
            grid.inside[idx] = volume.contains(&grid.center(idx));
        }
        Some(grid)
    }

    pub fn len(&self) -> usize {
        self.inside.len()
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> [usize; 3] {
        let x = idx % self.dims[0];
        let y = (idx / self.dims[0]) % self.dims[1];
        let z = idx / (self.dims[0] * self.dims[1]);
        [x, y, z]
    }

    pub fn center(&self, idx: usize) -> Vector3<f32> {
        let [x, y, z] = self.coords(idx);
        self.origin + Vector3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5) * self.h
    }

    pub fn samples(&self) -> Vec<usize> {
        (0..self.len()).filter(|&i| self.inside[i]).collect()
    }

    /// Neighbours in the positive x, y and z directions, so each face is
    /// visited once.
    pub fn forward_neighbours(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let [x, y, z] = self.coords(idx);
        let d = self.dims;
        [
            (x + 1 < d[0]).then(|| self.index(x + 1, y, z)),
            (y + 1 < d[1]).then(|| self.index(x, y + 1, z)),
            (z + 1 < d[2]).then(|| self.index(x, y, z + 1)),
        ]
        .into_iter()
        .flatten()
    }

    /// All six face neighbours.
    pub fn neighbours(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let [x, y, z] = self.coords(idx);
        let d = self.dims;
        [
            (x > 0).then(|| self.index(x - 1, y, z)),
            (x + 1 < d[0]).then(|| self.index(x + 1, y, z)),
            (y > 0).then(|| self.index(x, y - 1, z)),
            (y + 1 < d[1]).then(|| self.index(x, y + 1, z)),
            (z > 0).then(|| self.index(x, y, z - 1)),
            (z + 1 < d[2]).then(|| self.index(x, y, z + 1)),
        ]
        .into_iter()
        .flatten()
    }

    /// Tight box around the voxels in `samples`.
    pub fn bounds_of(&self, samples: &[usize]) -> Aabb {
        let mut b = Aabb::empty();
        let half = Vector3::repeat(self.h * 0.5);
        for &s in samples {
            let c = self.center(s);
            b.grow(&(c - half));
            b.grow(&(c + half));
        }
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_multiples_do_not_grow_extra_layers() {
        let v = SourceVolume::cuboid(Vector3::new(0.5, 0.5, 0.25));
        let g = VoxelGrid::sample(&v, 20).unwrap();
        assert_eq!(g.dims, [20, 20, 10]);
        assert_eq!(g.samples().len(), 4000);
    }

    #[test]
    fn coords_invert_index() {
        let v = SourceVolume::cuboid(Vector3::new(1., 0.5, 0.25));
        let g = VoxelGrid::sample(&v, 8).unwrap();
        for idx in [0, 7, 13, g.len() - 1] {
            let [x, y, z] = g.coords(idx);
            assert_eq!(g.index(x, y, z), idx);
        }
        assert_eq!(g.forward_neighbours(0).count(), 3);
        assert_eq!(g.neighbours(0).count(), 3);
    }

    #[test]
    fn flat_volume_has_no_grid() {
        let v = SourceVolume::cuboid(Vector3::zeros());
        assert!(VoxelGrid::sample(&v, 8).is_none());
    }
}
