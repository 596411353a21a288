pub mod tri;
pub mod volume;

use na::{Matrix3xX, Vector3};

pub type VMat = Matrix3xX<f32>;
pub type FMat = Matrix3xX<u32>;

/// Axis-aligned box, used for volume bounds and static environment geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}
impl Aabb {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self {
            min: min.inf(&max),
            max: min.sup(&max),
        }
    }
    pub fn from_center(center: Vector3<f32>, half_extents: Vector3<f32>) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }
    pub fn empty() -> Self {
        Self {
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }
    pub fn grow(&mut self, p: &Vector3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }
    pub fn extents(&self) -> Vector3<f32> {
        self.max - self.min
    }
    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }
    pub fn volume(&self) -> f32 {
        if self.is_empty() {
            return 0.;
        }
        let e = self.extents();
        e.x * e.y * e.z
    }
    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
    pub fn closest_point(&self, p: &Vector3<f32>) -> Vector3<f32> {
        p.sup(&self.min).inf(&self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closest_point_clamps_outside_points() {
        let b = Aabb::from_center(Vector3::zeros(), Vector3::new(1., 2., 3.));
        assert_eq!(b.closest_point(&Vector3::new(5., 0., -9.)), Vector3::new(1., 0., -3.));
        assert_eq!(b.closest_point(&Vector3::new(0.5, 0.5, 0.5)), Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(b.volume(), 48.);
    }

    #[test]
    fn empty_box_has_no_volume() {
        let mut b = Aabb::empty();
        assert!(b.is_empty());
        assert_eq!(b.volume(), 0.);
        b.grow(&Vector3::new(1., 1., 1.));
        b.grow(&Vector3::new(-1., 0., 2.));
        assert!(!b.is_empty());
        assert_eq!(b.extents(), Vector3::new(2., 1., 1.));
    }
}
