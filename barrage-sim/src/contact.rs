//! Sphere contacts: sort-and-sweep pair finding, a sequential impulse
//! solver and begin/persist/end reporting.

use crate::{cluster::Cluster, env::StaticId};

use model::fragment::FragmentId;
use na::Vector3;

use std::collections::BTreeSet;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// What a fragment is touching.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub enum Other {
    Fragment(FragmentId),
    Static(StaticId),
}

/// Contact identity, with the lower fragment first for fragment pairs.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone)]
pub struct ContactPair {
    pub fragment: FragmentId,
    pub other: Other,
}

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
pub enum ContactPhase {
    Begin,
    Persist,
    End,
}

#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone)]
pub struct ContactEvent {
    pub pair: ContactPair,
    pub phase: ContactPhase,
}

/// Diffs the pairs touching this tick against last tick's.
#[derive(Debug, Default, Clone)]
pub struct ContactTracker {
    previous: BTreeSet<ContactPair>,
    current: BTreeSet<ContactPair>,
    events: Vec<ContactEvent>,
}
impl ContactTracker {
    pub fn touch(&mut self, pair: ContactPair) {
        self.current.insert(pair);
    }
    pub fn finish_tick(&mut self) {
        self.events.clear();
        for pair in self.current.iter() {
            let phase = if self.previous.contains(pair) {
                ContactPhase::Persist
            } else {
                ContactPhase::Begin
            };
            self.events.push(ContactEvent { pair: *pair, phase });
        }
        for pair in self.previous.difference(&self.current) {
            self.events.push(ContactEvent {
                pair: *pair,
                phase: ContactPhase::End,
            });
        }
        self.previous = std::mem::take(&mut self.current);
    }
    pub fn events(&self) -> &[ContactEvent] {
        &self.events
    }
    pub fn touching(&self) -> usize {
        self.previous.len()
    }
}

/// A fragment sphere in world space.
#[derive(Debug, Copy, Clone)]
pub struct Collider {
    pub fragment: FragmentId,
    pub cluster: u32,
    pub center: Vector3<f32>,
    pub radius: f32,
}

/// Candidate pairs whose x extents overlap, as indices into `colliders`
/// after sorting it by min x.
pub fn sweep(colliders: &mut [Collider], out: &mut Vec<(usize, usize)>) {
    colliders.sort_by(|a, b| {
        (a.center.x - a.radius)
            .total_cmp(&(b.center.x - b.radius))
            .then(a.fragment.cmp(&b.fragment))
    });
    for i in 0..colliders.len() {
        let a = &colliders[i];
        let max_x = a.center.x + a.radius;
        for (j, b) in colliders.iter().enumerate().skip(i + 1) {
            if b.center.x - b.radius > max_x {
                break;
            }
            out.push((i, j));
        }
    }
}

/// One contact point between a fragment and either another fragment or
/// static geometry. `normal` points from `a` towards `b`.
#[derive(Debug, Clone)]
pub struct Contact {
    pub pair: ContactPair,
    pub a: u32,
    pub fa: FragmentId,
    pub b: Option<(u32, FragmentId)>,
    pub normal: Vector3<f32>,
    pub tangents: [Vector3<f32>; 2],
    pub point: Vector3<f32>,
    pub depth: f32,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    target_speed: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

/// Body properties frozen for one solve. Sleeping and static bodies have
/// zero inverse mass.
#[derive(Debug, Clone)]
pub struct SolverBody {
    pub pos: Vector3<f32>,
    pub inv_mass: f32,
    pub inv_inertia: na::Matrix3<f32>,
    pub lin_vel: Vector3<f32>,
    pub ang_vel: Vector3<f32>,
}
impl SolverBody {
    pub fn of(c: &Cluster) -> Self {
        if c.asleep {
            Self {
                pos: c.pose.pos,
                inv_mass: 0.,
                inv_inertia: na::Matrix3::zeros(),
                lin_vel: Vector3::zeros(),
                ang_vel: Vector3::zeros(),
            }
        } else {
            Self {
                pos: c.pose.pos,
                inv_mass: c.inv_mass,
                inv_inertia: c.world_inv_inertia(),
                lin_vel: c.lin_vel,
                ang_vel: c.ang_vel,
            }
        }
    }
    fn velocity_at(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.lin_vel + self.ang_vel.cross(&(p - self.pos))
    }
    fn apply(&mut self, j: &Vector3<f32>, at: &Vector3<f32>) {
        self.lin_vel += j * self.inv_mass;
        self.ang_vel += self.inv_inertia * (at - self.pos).cross(j);
    }
    fn effective_mass(&self, at: &Vector3<f32>, dir: &Vector3<f32>) -> f32 {
        let rn = (at - self.pos).cross(dir);
        self.inv_mass + rn.dot(&(self.inv_inertia * rn))
    }
}

fn tangent_basis(n: &Vector3<f32>) -> [Vector3<f32>; 2] {
    let helper = if n.x.abs() < 0.57 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = n.cross(&helper).normalize();
    [t1, n.cross(&t1)]
}

pub struct SolverParams {
    pub dt: f32,
    pub restitution: f32,
    pub restitution_speed: f32,
    pub friction: f32,
    pub baumgarte: f32,
    pub slop: f32,
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pair: ContactPair,
        a: u32,
        fa: FragmentId,
        b: Option<(u32, FragmentId)>,
        normal: Vector3<f32>,
        point: Vector3<f32>,
        depth: f32,
        bodies: &[SolverBody],
        params: &SolverParams,
    ) -> Self {
        let tangents = tangent_basis(&normal);
        let body_b = b.map(|(c, _)| &bodies[c as usize]);
        let body_a = &bodies[a as usize];
        let k = |d: &Vector3<f32>| {
            let k = body_a.effective_mass(&point, d) + body_b.map_or(0., |bb| bb.effective_mass(&point, d));
            if k > 0. {
                1. / k
            } else {
                0.
            }
        };
        let rel = body_b.map_or(Vector3::zeros(), |bb| bb.velocity_at(&point)) - body_a.velocity_at(&point);
        let closing = rel.dot(&normal);
        let bounce = if closing < -params.restitution_speed {
            -params.restitution * closing
        } else {
            0.
        };
        let bias = params.baumgarte / params.dt * (depth - params.slop).max(0.);
        Self {
            pair,
            a,
            fa,
            b,
            normal,
            tangents,
            point,
            depth,
            normal_mass: k(&normal),
            tangent_mass: [k(&tangents[0]), k(&tangents[1])],
            target_speed: bounce.max(bias),
            normal_impulse: 0.,
            tangent_impulse: [0., 0.],
        }
    }

    /// Total impulse delivered so far.
    pub fn impulse(&self) -> Vector3<f32> {
        self.normal * self.normal_impulse
            + self.tangents[0] * self.tangent_impulse[0]
            + self.tangents[1] * self.tangent_impulse[1]
    }

    /// One pass over this contact. `a` receives the negated impulse.
    pub fn solve(&mut self, bodies: &mut [SolverBody], friction: f32) {
        let vn = self.relative_velocity(bodies).dot(&self.normal);
        let lambda = self.normal_mass * (self.target_speed - vn);
        let total = (self.normal_impulse + lambda).max(0.);
        let dj = total - self.normal_impulse;
        self.normal_impulse = total;
        self.push(bodies, &(self.normal * dj));

        // friction: both tangents, clamped to the Coulomb disk
        let v = self.relative_velocity(bodies);
        let limit = friction * self.normal_impulse;
        let mut next = [0.; 2];
        for (i, t) in self.tangents.iter().enumerate() {
            next[i] = self.tangent_impulse[i] - self.tangent_mass[i] * v.dot(t);
        }
        let len = (next[0] * next[0] + next[1] * next[1]).sqrt();
        if len > limit && len > 0. {
            let s = limit / len;
            next = [next[0] * s, next[1] * s];
        }
        let dj = self.tangents[0] * (next[0] - self.tangent_impulse[0])
            + self.tangents[1] * (next[1] - self.tangent_impulse[1]);
        self.tangent_impulse = next;
        self.push(bodies, &dj);
    }

    fn relative_velocity(&self, bodies: &[SolverBody]) -> Vector3<f32> {
        let vb = self
            .b
            .map_or(Vector3::zeros(), |(c, _)| bodies[c as usize].velocity_at(&self.point));
        vb - bodies[self.a as usize].velocity_at(&self.point)
    }

    fn push(&self, bodies: &mut [SolverBody], j: &Vector3<f32>) {
        bodies[self.a as usize].apply(&-j, &self.point);
        if let Some((c, _)) = self.b {
            bodies[c as usize].apply(j, &self.point);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn body(inv_mass: f32, vel: Vector3<f32>) -> SolverBody {
        SolverBody {
            pos: Vector3::zeros(),
            inv_mass,
            inv_inertia: na::Matrix3::zeros(),
            lin_vel: vel,
            ang_vel: Vector3::zeros(),
        }
    }

    fn params() -> SolverParams {
        SolverParams {
            dt: 0.01,
            restitution: 0.,
            restitution_speed: 1.,
            friction: 0.5,
            baumgarte: 0.,
            slop: 0.,
        }
    }

    fn pair() -> ContactPair {
        ContactPair {
            fragment: FragmentId(0),
            other: Other::Static(StaticId::Plane(0)),
        }
    }

    #[test]
    fn stops_a_falling_body() {
        let mut bodies = vec![body(1., Vector3::new(0., -2., 0.))];
        let mut c = Contact::new(
            pair(),
            0,
            FragmentId(0),
            None,
            -Vector3::y(),
            Vector3::zeros(),
            0.,
            &bodies,
            &params(),
        );
        for _ in 0..4 {
            c.solve(&mut bodies, 0.5);
        }
        assert_relative_eq!(bodies[0].lin_vel.y, 0., epsilon = 1e-5);
        assert_relative_eq!(c.impulse().y, -2., epsilon = 1e-5);
    }

    #[test]
    fn friction_is_bounded_by_normal_impulse() {
        let mut bodies = vec![body(1., Vector3::new(10., -1., 0.))];
        let mut c = Contact::new(
            pair(),
            0,
            FragmentId(0),
            None,
            -Vector3::y(),
            Vector3::zeros(),
            0.,
            &bodies,
            &params(),
        );
        c.solve(&mut bodies, 0.5);
        assert_relative_eq!(bodies[0].lin_vel.x, 9.5, epsilon = 1e-5);
    }

    #[test]
    fn sweep_reports_overlapping_x() {
        let mk = |id: u32, x: f32| Collider {
            fragment: FragmentId(id),
            cluster: id,
            center: Vector3::new(x, 0., 0.),
            radius: 0.5,
        };
        let mut cs = vec![mk(0, 5.), mk(1, 0.), mk(2, 0.8)];
        let mut pairs = vec![];
        sweep(&mut cs, &mut pairs);
        assert_eq!(pairs, vec![(0, 1)]);
        assert_eq!(cs[0].fragment, FragmentId(1));
    }

    #[test]
    fn tracker_reports_phases() {
        let mut t = ContactTracker::default();
        t.touch(pair());
        t.finish_tick();
        assert_eq!(t.events()[0].phase, ContactPhase::Begin);
        t.touch(pair());
        t.finish_tick();
        assert_eq!(t.events()[0].phase, ContactPhase::Persist);
        t.finish_tick();
        assert_eq!(t.events()[0].phase, ContactPhase::End);
        t.finish_tick();
        assert!(t.events().is_empty());
    }
}
