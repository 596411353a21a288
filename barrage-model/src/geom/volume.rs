use super::{tri::TriMesh, Aabb};

use na::Vector3;
use serde::{Deserialize, Serialize};

fn default_density() -> f32 {
    1.
}
fn default_toughness() -> f32 {
    100.
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VolumeShape {
    Cuboid { half_extents: [f32; 3] },
    Sphere { radius: f32 },
    Mesh(TriMesh),
}

/// A solid handed in by the content pipeline, in body space. The
/// `center` offsets the shape; mesh vertices are relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVolume {
    pub shape: VolumeShape,
    #[serde(default)]
    pub center: [f32; 3],
    #[serde(default = "default_density")]
    pub density: f32,
    /// Bond strength per unit of shared contact area.
    #[serde(default = "default_toughness")]
    pub toughness: f32,
}
impl SourceVolume {
    pub fn new(shape: VolumeShape) -> Self {
        Self {
            shape,
            center: [0.; 3],
            density: default_density(),
            toughness: default_toughness(),
        }
    }
    pub fn cuboid(half_extents: Vector3<f32>) -> Self {
        Self::new(VolumeShape::Cuboid {
            half_extents: half_extents.into(),
        })
    }
    pub fn sphere(radius: f32) -> Self {
        Self::new(VolumeShape::Sphere { radius })
    }
    pub fn mesh(mesh: TriMesh) -> Self {
        Self::new(VolumeShape::Mesh(mesh))
    }
    pub fn with_center(mut self, center: Vector3<f32>) -> Self {
        self.center = center.into();
        self
    }
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }
    pub fn with_toughness(mut self, toughness: f32) -> Self {
        self.toughness = toughness;
        self
    }
    pub fn center(&self) -> Vector3<f32> {
        Vector3::from(self.center)
    }
    pub fn bounds(&self) -> Aabb {
        let c = self.center();
        match &self.shape {
            VolumeShape::Cuboid { half_extents } => {
                Aabb::from_center(c, Vector3::from(*half_extents).abs())
            }
            VolumeShape::Sphere { radius } => Aabb::from_center(c, Vector3::repeat(radius.abs())),
            VolumeShape::Mesh(m) => {
                let b = m.bounds();
                Aabb::new(b.min + c, b.max + c)
            }
        }
    }
    /// Volume of the solid. Zero for flat or empty shapes.
    pub fn measure(&self) -> f32 {
        let m = match &self.shape {
            VolumeShape::Cuboid { half_extents } => {
                half_extents.iter().map(|h| 2. * h.max(0.)).product::<f32>()
            }
            VolumeShape::Sphere { radius } => {
                4. / 3. * std::f32::consts::PI * radius.max(0.).powi(3)
            }
            VolumeShape::Mesh(m) => m.volume(),
        };
        if m.is_finite() {
            m
        } else {
            0.
        }
    }
    pub fn mass(&self) -> f32 {
        self.measure() * self.density
    }
    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        let local = p - self.center();
        match &self.shape {
            VolumeShape::Cuboid { half_extents } => {
                (0..3).all(|i| local[i].abs() <= half_extents[i])
            }
            VolumeShape::Sphere { radius } => local.norm_squared() <= radius * radius,
            VolumeShape::Mesh(m) => m.contains(&local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::tri::unit_cube;
    use approx::assert_relative_eq;

    #[test]
    fn measures_each_shape() {
        assert_relative_eq!(SourceVolume::cuboid(Vector3::new(1., 0.5, 2.)).measure(), 8.);
        assert_relative_eq!(
            SourceVolume::sphere(1.).measure(),
            4.18879,
            epsilon = 1e-4
        );
        assert_relative_eq!(SourceVolume::mesh(unit_cube()).measure(), 1., epsilon = 1e-6);
        assert_eq!(SourceVolume::cuboid(Vector3::new(1., 0., 1.)).measure(), 0.);
    }

    #[test]
    fn containment_respects_center() {
        let v = SourceVolume::sphere(1.).with_center(Vector3::new(5., 0., 0.));
        assert!(v.contains(&Vector3::new(5.5, 0., 0.)));
        assert!(!v.contains(&Vector3::zeros()));
        assert_eq!(v.bounds().min, Vector3::new(4., -1., -1.));
    }

    #[test]
    fn mass_scales_with_density() {
        let v = SourceVolume::cuboid(Vector3::repeat(0.5)).with_density(2500.);
        assert_relative_eq!(v.mass(), 2500.);
    }
}
