use na::{Matrix3, Vector3};

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Default)]
#[repr(transparent)]
pub struct FragmentId(pub u32);
impl FragmentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
impl From<u32> for FragmentId {
    fn from(a: u32) -> Self {
        Self(a)
    }
}
impl From<usize> for FragmentId {
    fn from(a: usize) -> Self {
        Self(a as u32)
    }
}
impl From<FragmentId> for usize {
    fn from(a: FragmentId) -> Self {
        a.0 as usize
    }
}
impl std::fmt::Display for FragmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a fragment inside a running simulation.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
#[repr(u32)]
pub enum FragmentState {
    /// Moves rigidly with at least one other fragment.
    Bonded = 0,
    /// Free six degree of freedom body.
    Detached = 1,
    /// At rest, skipped by integration.
    Settled = 2,
    /// Left the world bounds. Terminal.
    Inert = 3,
}

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
pub enum Transition {
    /// The fragment's last intact bond broke.
    Detach,
    /// Stayed below the rest threshold long enough.
    Settle,
    /// Received an impulse above the wake threshold.
    Wake,
    /// Left the world bounds.
    Expire,
}

impl FragmentState {
    pub fn next(self, t: Transition) -> FragmentState {
        use FragmentState::*;
        match (self, t) {
            (Inert, _) => Inert,
            (_, Transition::Expire) => Inert,
            (Bonded, Transition::Detach) => Detached,
            (Detached, Transition::Settle) => Settled,
            (Settled, Transition::Wake) => Detached,
            (s, _) => s,
        }
    }
    pub fn is_simulated(self) -> bool {
        matches!(self, FragmentState::Bonded | FragmentState::Detached)
    }
}
impl TryFrom<u32> for FragmentState {
    type Error = u32;
    fn try_from(v: u32) -> Result<Self, u32> {
        match v {
            0 => Ok(FragmentState::Bonded),
            1 => Ok(FragmentState::Detached),
            2 => Ok(FragmentState::Settled),
            3 => Ok(FragmentState::Inert),
            _ => Err(v),
        }
    }
}

/// Fragments collide as spheres around their centroid.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CollisionShape {
    /// Radius of the sphere with the fragment's volume.
    pub radius: f32,
    /// Radius enclosing every voxel of the fragment.
    pub bounding_radius: f32,
}
impl CollisionShape {
    pub fn sphere(radius: f32) -> Self {
        Self {
            radius,
            bounding_radius: radius,
        }
    }
}

/// A rigid sub-body produced by the fracture builder. Everything here is in
/// body space and fixed for the life of the instance; velocities, lifecycle
/// and world poses belong to the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub id: FragmentId,
    /// Index of the top level cell this fragment was carved from.
    pub cell: u32,
    pub mass: f32,
    pub volume: f32,
    /// Inertia about the centroid.
    pub inertia: Matrix3<f32>,
    pub centroid: Vector3<f32>,
    pub shape: CollisionShape,
    pub gravity_factor: f32,
}
impl Fragment {
    pub fn inv_mass(&self) -> f32 {
        if self.mass > 0. {
            1. / self.mass
        } else {
            0.
        }
    }
}

/// Inertia tensor of a solid sphere.
pub fn sphere_inertia(mass: f32, radius: f32) -> Matrix3<f32> {
    Matrix3::from_diagonal_element(0.4 * mass * radius * radius)
}

/// Shifts an inertia tensor about a centroid to a point offset by `r`.
pub fn parallel_axis(inertia: &Matrix3<f32>, mass: f32, r: &Vector3<f32>) -> Matrix3<f32> {
    inertia + (Matrix3::from_diagonal_element(r.norm_squared()) - r * r.transpose()) * mass
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transitions_follow_the_table() {
        use FragmentState::*;
        assert_eq!(Bonded.next(Transition::Detach), Detached);
        assert_eq!(Bonded.next(Transition::Settle), Bonded);
        assert_eq!(Detached.next(Transition::Settle), Settled);
        assert_eq!(Settled.next(Transition::Wake), Detached);
        assert_eq!(Settled.next(Transition::Detach), Settled);
        assert_eq!(Detached.next(Transition::Expire), Inert);
        assert_eq!(Inert.next(Transition::Wake), Inert);
    }

    #[test]
    fn states_never_return_to_bonded() {
        use FragmentState::*;
        let all = [Bonded, Detached, Settled, Inert];
        let moves = [Transition::Detach, Transition::Settle, Transition::Wake, Transition::Expire];
        for s in all.into_iter().filter(|s| *s != Bonded) {
            for t in moves {
                assert_ne!(s.next(t), Bonded);
            }
        }
    }

    #[test]
    fn state_round_trips_through_wire_value() {
        for s in [FragmentState::Bonded, FragmentState::Settled, FragmentState::Inert] {
            assert_eq!(FragmentState::try_from(s as u32), Ok(s));
        }
        assert_eq!(FragmentState::try_from(9), Err(9));
    }

    #[test]
    fn parallel_axis_adds_offset_term() {
        let i = parallel_axis(&Matrix3::zeros(), 2., &Vector3::new(1., 0., 0.));
        assert_relative_eq!(i, Matrix3::from_diagonal(&Vector3::new(0., 2., 2.)));
    }
}
