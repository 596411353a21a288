//! Rigid groups of bonded fragments. A cluster is the body that actually
//! gets integrated; its fragments ride along at fixed offsets.

use model::{
    fragment::{parallel_axis, Fragment, FragmentId},
    Pose,
};
use na::{Matrix3, Vector3};

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct ClusterId(pub u32);
impl ClusterId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Ascending.
    pub members: Vec<FragmentId>,
    pub mass: f32,
    pub inv_mass: f32,
    /// About the centroid, in body space.
    pub inertia: Matrix3<f32>,
    pub inv_inertia: Matrix3<f32>,
    /// World centroid and orientation.
    pub pose: Pose,
    pub lin_vel: Vector3<f32>,
    pub ang_vel: Vector3<f32>,
    pub gravity_factor: f32,
    pub asleep: bool,
    pub resting_ticks: u32,
    /// Woken by a contact during the previous tick.
    pub wake_pending: bool,
}

/// Mass properties of a set of fragments placed at body space `offsets`.
pub struct MassProps {
    pub mass: f32,
    pub centroid: Vector3<f32>,
    pub inertia: Matrix3<f32>,
    pub gravity_factor: f32,
}

impl MassProps {
    pub fn of<'a, I>(parts: I) -> MassProps
    where
        I: IntoIterator<Item = (&'a Fragment, Vector3<f32>)> + Clone,
    {
        let mut mass = 0.;
        let mut moment = Vector3::zeros();
        let mut weighted_gravity = 0.;
        for (f, at) in parts.clone() {
            mass += f.mass;
            moment += at * f.mass;
            weighted_gravity += f.gravity_factor * f.mass;
        }
        let centroid = if mass > 0. { moment / mass } else { Vector3::zeros() };
        let mut inertia = Matrix3::zeros();
        for (f, at) in parts {
            inertia += parallel_axis(&f.inertia, f.mass, &(at - centroid));
        }
        MassProps {
            mass,
            centroid,
            inertia,
            gravity_factor: if mass > 0. { weighted_gravity / mass } else { 1. },
        }
    }
}

impl Cluster {
    pub fn new(members: Vec<FragmentId>, props: &MassProps, pose: Pose) -> Self {
        let inv_inertia = props.inertia.try_inverse().unwrap_or_else(Matrix3::zeros);
        Self {
            members,
            mass: props.mass,
            inv_mass: if props.mass > 0. { 1. / props.mass } else { 0. },
            inertia: props.inertia,
            inv_inertia,
            pose,
            lin_vel: Vector3::zeros(),
            ang_vel: Vector3::zeros(),
            gravity_factor: props.gravity_factor,
            asleep: false,
            resting_ticks: 0,
            wake_pending: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.members.is_empty()
    }

    pub fn world_inv_inertia(&self) -> Matrix3<f32> {
        let r = self.pose.ori.to_rotation_matrix();
        r.matrix() * self.inv_inertia * r.matrix().transpose()
    }

    pub fn world_inertia(&self) -> Matrix3<f32> {
        let r = self.pose.ori.to_rotation_matrix();
        r.matrix() * self.inertia * r.matrix().transpose()
    }

    /// Velocity of the material point at world position `p`.
    pub fn velocity_at(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.lin_vel + self.ang_vel.cross(&(p - self.pose.pos))
    }

    pub fn apply_impulse(&mut self, j: &Vector3<f32>, at: &Vector3<f32>) {
        self.lin_vel += j * self.inv_mass;
        let r = at - self.pose.pos;
        self.ang_vel += self.world_inv_inertia() * r.cross(j);
    }

    /// Kinetic energy per unit mass.
    pub fn specific_energy(&self) -> f32 {
        if self.mass <= 0. {
            return 0.;
        }
        let rot = self.ang_vel.dot(&(self.world_inertia() * self.ang_vel));
        0.5 * self.lin_vel.norm_squared() + 0.5 * rot / self.mass
    }

    pub fn sleep(&mut self) {
        self.asleep = true;
        self.lin_vel = Vector3::zeros();
        self.ang_vel = Vector3::zeros();
        self.resting_ticks = 0;
        self.wake_pending = false;
    }

    pub fn wake(&mut self) {
        self.asleep = false;
        self.resting_ticks = 0;
        self.wake_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use model::fragment::{sphere_inertia, CollisionShape};

    fn frag(id: u32, mass: f32) -> Fragment {
        Fragment {
            id: FragmentId(id),
            cell: 0,
            mass,
            volume: mass,
            inertia: sphere_inertia(mass, 0.5),
            centroid: Vector3::zeros(),
            shape: CollisionShape::sphere(0.5),
            gravity_factor: 1.,
        }
    }

    #[test]
    fn combined_centroid_is_mass_weighted() {
        let (a, b) = (frag(0, 1.), frag(1, 3.));
        let p = MassProps::of([(&a, Vector3::zeros()), (&b, Vector3::new(4., 0., 0.))]);
        assert_relative_eq!(p.mass, 4.);
        assert_relative_eq!(p.centroid, Vector3::new(3., 0., 0.));
        // spin about x is unaffected by offsets along x
        assert_relative_eq!(p.inertia[(0, 0)], 0.1 * 4.);
        assert_relative_eq!(p.inertia[(1, 1)], 0.1 * 4. + 1. * 9. + 3. * 1.);
    }

    #[test]
    fn off_center_impulse_spins() {
        let a = frag(0, 2.);
        let props = MassProps::of([(&a, Vector3::zeros())]);
        let mut c = Cluster::new(vec![a.id], &props, Pose::identity());
        c.apply_impulse(&Vector3::new(0., 1., 0.), &Vector3::new(1., 0., 0.));
        assert_relative_eq!(c.lin_vel, Vector3::new(0., 0.5, 0.));
        assert!(c.ang_vel.z > 0.);
        assert!(c.specific_energy() > 0.);
        c.sleep();
        assert_eq!(c.specific_energy(), 0.);
    }
}
