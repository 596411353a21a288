//! Shared data model for the fracture core: source volumes, fragments, the
//! bond table and the per-tick pose snapshot handed to renderers.

pub mod bond;
pub mod fragment;
pub mod geom;
pub mod pose;

pub use bond::{Bond, BondId, BondKey, BondKind, BondState, BondTable};
pub use fragment::{CollisionShape, Fragment, FragmentId, FragmentState, Transition};
pub use pose::{Diagnostics, PoseEntry, PoseSnapshot};

use na::{Matrix4, Point3, UnitQuaternion, Vector3};

/// Rigid transform: rotation followed by translation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub pos: Vector3<f32>,
    pub ori: UnitQuaternion<f32>,
}

impl Pose {
    pub fn identity() -> Self {
        Self {
            pos: Vector3::zeros(),
            ori: UnitQuaternion::identity(),
        }
    }

    pub fn new(pos: Vector3<f32>, ori: UnitQuaternion<f32>) -> Self {
        Self { pos, ori }
    }

    pub fn from_translation(pos: Vector3<f32>) -> Self {
        Self {
            pos,
            ori: UnitQuaternion::identity(),
        }
    }

    pub fn mat(&self) -> Matrix4<f32> {
        let mut t_mat = self.ori.to_homogeneous();
        t_mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.pos);
        t_mat
    }

    pub fn transform_point(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.ori.transform_point(&Point3::from(*p)).coords + self.pos
    }

    pub fn transform_vector(&self, v: &Vector3<f32>) -> Vector3<f32> {
        self.ori.transform_vector(v)
    }

    pub fn inverse(&self) -> Self {
        let ori = self.ori.inverse();
        Self {
            pos: -(ori * self.pos),
            ori,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Pose {
    type Output = Pose;
    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            pos: self.pos + self.ori * rhs.pos,
            ori: self.ori * rhs.ori,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_then_invert_is_identity() {
        let a = Pose::new(
            Vector3::new(1., 2., 3.),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7),
        );
        let b = a * a.inverse();
        assert_relative_eq!(b.pos, Vector3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(b.ori.angle(), 0., epsilon = 1e-6);
    }

    #[test]
    fn matrix_matches_point_transform() {
        let a = Pose::new(
            Vector3::new(0., -1., 4.),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 1.2),
        );
        let p = Vector3::new(0.3, 0.2, -0.5);
        let h = a.mat() * p.push(1.);
        assert_relative_eq!(h.xyz(), a.transform_point(&p), epsilon = 1e-6);
    }
}
