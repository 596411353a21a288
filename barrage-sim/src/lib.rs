//! # Rigid-body simulation core
//!
//! Owns every fragment of one fractured body for the life of an instance.
//! Fragments joined by intact bonds move as a single rigid [`Cluster`];
//! breaking bonds splits clusters, and a fragment left alone in its cluster
//! is a free body. Each [`Simulation::step`] advances one fixed tick:
//!
//! 1. resolve this tick's triggers into fragment impulses and load bonds,
//! 2. break overstressed bonds, split the affected clusters, apply impulses,
//! 3. integrate in substeps with sphere contacts against fragments and the
//!    static environment,
//! 4. retire fragments that left the world and put resting bodies to sleep.
//!
//! Everything iterates in id order over plain vectors, so the same inputs
//! always produce the same poses.

extern crate barrage_events as events;
extern crate barrage_model as model;
extern crate barrage_shatter as shatter;
extern crate nalgebra as na;

pub mod anomaly;
pub mod cluster;
pub mod config;
pub mod contact;
pub mod env;

pub use anomaly::Anomaly;
pub use cluster::{Cluster, ClusterId};
pub use config::{BoxDef, EnvConfig, PlaneDef, SimConfig, WorldBounds};
pub use contact::{ContactEvent, ContactPair, ContactPhase, Other};
pub use env::{Environment, StaticId};

use cluster::MassProps;
use contact::{Collider, Contact, ContactTracker, SolverBody, SolverParams};
use env::StaticHit;
use events::{RegionMap, Target, TriggerEvent};
use model::{
    bond::{BondId, BondKey, BondTable},
    fragment::{Fragment, FragmentId, FragmentState, Transition},
    geom::Aabb,
    pose::{Diagnostics, PoseEntry, PoseSnapshot},
    Pose,
};
use na::{UnitQuaternion, Vector3};
use shatter::FractureGraph;

use std::collections::{BTreeSet, VecDeque};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Runtime state of one fragment.
#[derive(Debug, Clone)]
struct Body {
    state: FragmentState,
    cluster: u32,
    /// Centroid relative to the cluster centroid, in cluster body space.
    offset: Vector3<f32>,
    /// Frozen once the fragment goes inert.
    last_pose: Pose,
}

pub struct Simulation {
    cfg: SimConfig,
    env: Environment,
    regions: RegionMap,
    bounds: Aabb,
    fragments: Vec<Fragment>,
    bodies: Vec<Body>,
    clusters: Vec<Cluster>,
    bonds: BondTable,
    /// Fragment pairs that overlapped when their cluster split. They don't
    /// collide until they have drifted apart once.
    ignored: BTreeSet<(FragmentId, FragmentId)>,
    tracker: ContactTracker,
    diagnostics: Diagnostics,
    tick: u64,
    pending: Vec<(FragmentId, Vector3<f32>)>,
    centers: Vec<Vector3<f32>>,
    colliders: Vec<Collider>,
    pairs: Vec<(usize, usize)>,
    solver_bodies: Vec<SolverBody>,
    contacts: Vec<Contact>,
    hits: Vec<StaticHit>,
}

impl Simulation {
    pub fn new(graph: FractureGraph, cfg: SimConfig, env: &EnvConfig, regions: RegionMap) -> Self {
        let FractureGraph {
            fragments, bonds, ..
        } = graph;
        let n = fragments.len();
        let mut sim = Self {
            bounds: Aabb::new(
                Vector3::from(cfg.world_bounds.min),
                Vector3::from(cfg.world_bounds.max),
            ),
            cfg,
            env: Environment::from(env),
            regions,
            bodies: fragments
                .iter()
                .map(|f| Body {
                    state: FragmentState::Bonded,
                    cluster: 0,
                    offset: Vector3::zeros(),
                    last_pose: Pose::from_translation(f.centroid),
                })
                .collect(),
            fragments,
            clusters: vec![],
            bonds,
            ignored: BTreeSet::new(),
            tracker: ContactTracker::default(),
            diagnostics: Diagnostics::default(),
            tick: 0,
            pending: vec![],
            centers: Vec::with_capacity(n),
            colliders: Vec::with_capacity(n),
            pairs: vec![],
            solver_bodies: vec![],
            contacts: vec![],
            hits: vec![],
        };

        let all: Vec<FragmentId> = (0..n as u32).map(FragmentId).collect();
        for members in sim.components(&all) {
            let props = MassProps::of(members.iter().map(|f| (&sim.fragments[f.index()], sim.fragments[f.index()].centroid)));
            let slot = sim.clusters.len() as u32;
            for f in members.iter() {
                let body = &mut sim.bodies[f.index()];
                body.cluster = slot;
                body.offset = sim.fragments[f.index()].centroid - props.centroid;
                if members.len() == 1 {
                    body.state = body.state.next(Transition::Detach);
                }
            }
            sim.clusters
                .push(Cluster::new(members, &props, Pose::from_translation(props.centroid)));
        }
        sim.refresh_counts();
        info!(
            "Simulation ready with {} fragments, {} bonds and {} bodies.",
            n,
            sim.bonds.len(),
            sim.clusters.len()
        );
        sim
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
    pub fn bonds(&self) -> &BondTable {
        &self.bonds
    }
    /// For tuning bond strengths on a live instance.
    pub fn bonds_mut(&mut self) -> &mut BondTable {
        &mut self.bonds
    }
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }
    /// Contacts that began, persisted or ended during the last tick.
    pub fn contact_events(&self) -> &[ContactEvent] {
        self.tracker.events()
    }

    pub fn fragment_state(&self, id: FragmentId) -> Option<FragmentState> {
        self.bodies.get(id.index()).map(|b| b.state)
    }
    pub fn fragment_pose(&self, id: FragmentId) -> Option<Pose> {
        self.bodies.get(id.index()).map(|_| self.pose_of(id))
    }
    /// Linear velocity of the fragment's centroid.
    pub fn fragment_velocity(&self, id: FragmentId) -> Option<Vector3<f32>> {
        let body = self.bodies.get(id.index())?;
        if body.state == FragmentState::Inert {
            return Some(Vector3::zeros());
        }
        let c = &self.clusters[body.cluster as usize];
        if c.asleep {
            return Some(Vector3::zeros());
        }
        Some(c.velocity_at(&self.center_of(id)))
    }
    /// `None` once the fragment is inert.
    pub fn cluster_of(&self, id: FragmentId) -> Option<ClusterId> {
        self.bodies
            .get(id.index())
            .filter(|b| b.state != FragmentState::Inert)
            .map(|b| ClusterId(b.cluster))
    }
    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.index()).filter(|c| c.is_alive())
    }
    pub fn clusters(&self) -> impl Iterator<Item = (ClusterId, &Cluster)> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_alive())
            .map(|(i, c)| (ClusterId(i as u32), c))
    }
    pub fn cluster_count(&self) -> usize {
        self.clusters().count()
    }
    /// Mass carried by every live cluster.
    pub fn cluster_mass(&self) -> f32 {
        self.clusters().map(|(_, c)| c.mass).sum()
    }

    /// Fills `out` with every fragment's pose, in id order.
    pub fn write_snapshot(&self, out: &mut PoseSnapshot) {
        out.begin(self.tick);
        for (i, body) in self.bodies.iter().enumerate() {
            let id = FragmentId(i as u32);
            out.push(PoseEntry::new(id, body.state, &self.pose_of(id)));
        }
        out.diagnostics = self.diagnostics;
    }

    pub fn snapshot(&self) -> PoseSnapshot {
        let mut s = PoseSnapshot::with_capacity(self.bodies.len());
        self.write_snapshot(&mut s);
        s
    }

    /// Advances one tick, applying `events` at its start.
    pub fn step(&mut self, events: &[TriggerEvent]) {
        self.tick += 1;
        trace!("Tick {} with {} events.", self.tick, events.len());

        for slot in 0..self.clusters.len() {
            if self.clusters[slot].wake_pending && self.clusters[slot].is_alive() {
                self.wake(slot);
            }
        }

        self.resolve(events);
        for i in 0..self.pending.len() {
            let (f, j) = self.pending[i];
            self.load(f, j.norm());
        }
        self.break_bonds();
        self.bonds.decay_stress(self.cfg.stress_decay);
        self.apply_pending();

        let dt = self.cfg.substep();
        for _ in 0..self.cfg.substeps.max(1) {
            self.substep(dt);
        }

        self.expire();
        self.track_rest();
        self.tracker.finish_tick();
        self.refresh_counts();
    }

    fn center_of(&self, f: FragmentId) -> Vector3<f32> {
        let body = &self.bodies[f.index()];
        if body.state == FragmentState::Inert {
            return body.last_pose.pos;
        }
        let c = &self.clusters[body.cluster as usize];
        c.pose.pos + c.pose.ori * body.offset
    }

    fn pose_of(&self, f: FragmentId) -> Pose {
        let body = &self.bodies[f.index()];
        if body.state == FragmentState::Inert {
            return body.last_pose;
        }
        let c = &self.clusters[body.cluster as usize];
        Pose::new(c.pose.pos + c.pose.ori * body.offset, c.pose.ori)
    }

    /// Connected runs of `members` over bonds that still hold, each sorted,
    /// ordered by their lowest fragment. Inert fragments are left out.
    fn components(&self, members: &[FragmentId]) -> Vec<Vec<FragmentId>> {
        let mut seen: BTreeSet<FragmentId> = BTreeSet::new();
        let mut out = vec![];
        let mut queue = VecDeque::new();
        for &start in members {
            if self.bodies[start.index()].state == FragmentState::Inert || !seen.insert(start) {
                continue;
            }
            let mut comp = vec![];
            queue.push_back(start);
            while let Some(f) = queue.pop_front() {
                comp.push(f);
                for n in self.bonds.intact_neighbours(f) {
                    if self.bodies[n.index()].state != FragmentState::Inert && seen.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
            comp.sort_unstable();
            out.push(comp);
        }
        out
    }

    fn resolve(&mut self, events: &[TriggerEvent]) {
        self.pending.clear();
        for ev in events {
            match ev.target {
                Target::Fragment(id) => {
                    if self.fragment_state(id).map_or(false, |s| s != FragmentState::Inert) {
                        self.pending.push((id, ev.impulse));
                    } else {
                        self.unknown(ev);
                    }
                }
                Target::Region(r) => match self.regions.get(r) {
                    Some(region) => {
                        let (center, radius) = (region.center(), region.radius);
                        self.spread(ev, &center, radius);
                    }
                    None => self.unknown(ev),
                },
                Target::Sphere { center, radius } => self.spread(ev, &center, radius),
            }
        }
    }

    fn spread(&mut self, ev: &TriggerEvent, center: &Vector3<f32>, radius: f32) {
        let live = (0..self.bodies.len() as u32)
            .map(FragmentId)
            .filter(|f| self.bodies[f.index()].state != FragmentState::Inert)
            .map(|f| (f, self.center_of(f)));
        let hits = events::spread(center, radius, ev.magnitude(), live);
        trace!("Trigger {} reached {} fragments.", ev.seq, hits.len());
        self.pending
            .extend(hits.into_iter().map(|h| (h.fragment, h.impulse)));
    }

    fn unknown(&mut self, ev: &TriggerEvent) {
        self.diagnostics.unknown_targets += 1;
        debug!(
            "{}",
            Anomaly::UnknownFragmentTarget {
                seq: ev.seq,
                target: ev.target
            }
        );
    }

    /// Loads the struck fragment's bonds with the share of `magnitude` the
    /// rest of its cluster has to absorb.
    fn load(&mut self, f: FragmentId, magnitude: f32) {
        let c = &self.clusters[self.bodies[f.index()].cluster as usize];
        if c.members.len() < 2 || c.mass <= 0. {
            return;
        }
        let share = magnitude * (c.mass - self.fragments[f.index()].mass) / c.mass;
        for k in 0..self.bonds.bonds_of(f).len() {
            let id = self.bonds.bonds_of(f)[k];
            self.bonds.add_stress(id, share);
        }
    }

    fn break_bonds(&mut self) {
        let mut touched = BTreeSet::new();
        let mut bodies = self.cluster_count() as u32;
        for i in 0..self.bonds.len() {
            let id = BondId(i as u32);
            let bond = self.bonds.bond(id);
            if !bond.is_overstressed() {
                continue;
            }
            let key = bond.key;
            // only a break that disconnects its fragments adds a body
            let splits = !self.bridged(id);
            if splits && bodies >= self.cfg.max_active_bodies {
                self.bonds.mark_unbreakable(id);
                self.diagnostics.refused_breaks += 1;
                if self.diagnostics.refused_breaks.is_power_of_two() {
                    warn!("{}", Anomaly::BondCapReached { bond: key, active: bodies });
                }
                continue;
            }
            if self.bonds.break_bond(id) {
                if splits {
                    bodies += 1;
                }
                self.diagnostics.broken_bonds += 1;
                touched.insert(self.bodies[key.a().index()].cluster);
            }
        }
        for slot in touched {
            self.reevaluate(slot);
        }
    }

    /// Whether the fragments of bond `id` stay connected through other
    /// bonds that hold.
    fn bridged(&self, id: BondId) -> bool {
        let key = self.bonds.bond(id).key;
        let mut seen = BTreeSet::from([key.a()]);
        let mut queue = VecDeque::from([key.a()]);
        while let Some(f) = queue.pop_front() {
            for &other in self.bonds.bonds_of(f) {
                let bond = self.bonds.bond(other);
                if other == id || !bond.connects() {
                    continue;
                }
                let Some(n) = bond.key.other(f) else { continue };
                if n == key.b() {
                    return true;
                }
                if self.bodies[n.index()].state != FragmentState::Inert && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        false
    }

    /// Splits a cluster along broken bonds and drops inert members. The
    /// component with the lowest fragment keeps the slot.
    fn reevaluate(&mut self, slot: u32) {
        let parent = self.clusters[slot as usize].clone();
        let comps = self.components(&parent.members);
        if comps.len() == 1 && comps[0].len() == parent.members.len() {
            return;
        }
        if comps.is_empty() {
            self.clusters[slot as usize].members.clear();
            debug!("Cluster {} emptied.", slot);
            return;
        }
        debug!(
            "Cluster {} split into {} bodies on tick {}.",
            slot,
            comps.len(),
            self.tick
        );

        if comps.len() > 1 {
            self.ignore_overlaps(&comps);
        }
        for (k, members) in comps.into_iter().enumerate() {
            let props = MassProps::of(
                members
                    .iter()
                    .map(|f| (&self.fragments[f.index()], self.bodies[f.index()].offset)),
            );
            let world = parent.pose.pos + parent.pose.ori * props.centroid;
            let id = if k == 0 {
                slot
            } else {
                self.clusters.len() as u32
            };
            for f in members.iter() {
                let body = &mut self.bodies[f.index()];
                body.offset -= props.centroid;
                body.cluster = id;
                if members.len() == 1 {
                    body.state = body.state.next(Transition::Detach);
                }
                body.state = body.state.next(Transition::Wake);
            }
            let mut cluster = Cluster::new(members, &props, Pose::new(world, parent.pose.ori));
            if !parent.asleep {
                cluster.lin_vel = parent.velocity_at(&world);
                cluster.ang_vel = parent.ang_vel;
            }
            if k == 0 {
                self.clusters[slot as usize] = cluster;
            } else {
                self.clusters.push(cluster);
            }
        }
    }

    fn ignore_overlaps(&mut self, comps: &[Vec<FragmentId>]) {
        let tagged: Vec<(usize, FragmentId, Vector3<f32>, f32)> = comps
            .iter()
            .enumerate()
            .flat_map(|(c, members)| members.iter().map(move |f| (c, *f)))
            .map(|(c, f)| (c, f, self.center_of(f), self.fragments[f.index()].shape.radius))
            .collect();
        for (i, a) in tagged.iter().enumerate() {
            for b in tagged[i + 1..].iter() {
                if a.0 != b.0 && (a.2 - b.2).norm() < a.3 + b.3 {
                    self.ignored.insert((a.1.min(b.1), a.1.max(b.1)));
                }
            }
        }
    }

    fn wake(&mut self, slot: usize) {
        self.clusters[slot].wake();
        for k in 0..self.clusters[slot].members.len() {
            let f = self.clusters[slot].members[k];
            let body = &mut self.bodies[f.index()];
            body.state = body.state.next(Transition::Wake);
        }
        debug!("Cluster {} woke on tick {}.", slot, self.tick);
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        for (f, j) in pending.iter() {
            let body = &self.bodies[f.index()];
            if body.state == FragmentState::Inert {
                continue;
            }
            let slot = body.cluster as usize;
            if self.clusters[slot].asleep {
                if j.norm() > self.cfg.wake_threshold {
                    self.wake(slot);
                } else {
                    self.diagnostics.absorbed_impulses += 1;
                    continue;
                }
            }
            let at = self.center_of(*f);
            self.clusters[slot].apply_impulse(j, &at);
        }
        self.pending = pending;
        self.pending.clear();
    }

    fn substep(&mut self, dt: f32) {
        let gravity = Vector3::from(self.cfg.gravity);
        let lin_keep = 1. / (1. + dt * self.cfg.linear_damping);
        let ang_keep = 1. / (1. + dt * self.cfg.angular_damping);
        for c in self.clusters.iter_mut().filter(|c| c.is_alive() && !c.asleep) {
            c.lin_vel += gravity * (c.gravity_factor * dt);
            c.lin_vel *= lin_keep;
            c.ang_vel *= ang_keep;
        }

        self.centers.clear();
        for i in 0..self.bodies.len() {
            let p = self.center_of(FragmentId(i as u32));
            self.centers.push(p);
        }
        let (centers, fragments) = (&self.centers, &self.fragments);
        self.ignored.retain(|(a, b)| {
            let reach = fragments[a.index()].shape.radius + fragments[b.index()].shape.radius;
            (centers[a.index()] - centers[b.index()]).norm() < reach
        });

        self.find_contacts(dt);
        for _ in 0..self.cfg.solver_iterations {
            for c in self.contacts.iter_mut() {
                c.solve(&mut self.solver_bodies, self.cfg.friction);
            }
        }
        self.check_divergence();

        for (c, sb) in self.clusters.iter_mut().zip(self.solver_bodies.iter()) {
            if c.is_alive() && !c.asleep {
                c.lin_vel = sb.lin_vel;
                c.ang_vel = sb.ang_vel;
            }
        }
        self.report_contacts();

        for c in self.clusters.iter_mut().filter(|c| c.is_alive() && !c.asleep) {
            c.pose.pos += c.lin_vel * dt;
            let q = UnitQuaternion::from_scaled_axis(c.ang_vel * dt) * c.pose.ori;
            c.pose.ori = UnitQuaternion::new_normalize(q.into_inner());
        }
    }

    fn find_contacts(&mut self, dt: f32) {
        self.colliders.clear();
        for (i, body) in self.bodies.iter().enumerate() {
            if body.state == FragmentState::Inert {
                continue;
            }
            self.colliders.push(Collider {
                fragment: FragmentId(i as u32),
                cluster: body.cluster,
                center: self.centers[i],
                radius: self.fragments[i].shape.radius,
            });
        }
        self.pairs.clear();
        contact::sweep(&mut self.colliders, &mut self.pairs);
        // sweep order is positional; solve in id order instead
        self.pairs.sort_by_key(|(i, j)| {
            let (a, b) = (self.colliders[*i].fragment, self.colliders[*j].fragment);
            (a.min(b), a.max(b))
        });

        self.solver_bodies.clear();
        self.solver_bodies
            .extend(self.clusters.iter().map(SolverBody::of));
        let params = SolverParams {
            dt,
            restitution: self.cfg.restitution,
            restitution_speed: self.cfg.restitution_speed,
            friction: self.cfg.friction,
            baumgarte: self.cfg.baumgarte,
            slop: self.cfg.slop,
        };

        self.contacts.clear();
        for &(i, j) in self.pairs.iter() {
            let (mut a, mut b) = (self.colliders[i], self.colliders[j]);
            if a.fragment > b.fragment {
                std::mem::swap(&mut a, &mut b);
            }
            if a.cluster == b.cluster {
                continue;
            }
            if self.clusters[a.cluster as usize].asleep && self.clusters[b.cluster as usize].asleep {
                continue;
            }
            if self.ignored.contains(&(a.fragment, b.fragment)) {
                continue;
            }
            let d = b.center - a.center;
            let dist = d.norm();
            let reach = a.radius + b.radius;
            if dist >= reach {
                continue;
            }
            let normal = if dist > 1e-6 { d / dist } else { Vector3::y() };
            let depth = reach - dist;
            let point = a.center + normal * (a.radius - depth * 0.5);
            self.contacts.push(Contact::new(
                ContactPair {
                    fragment: a.fragment,
                    other: Other::Fragment(b.fragment),
                },
                a.cluster,
                a.fragment,
                Some((b.cluster, b.fragment)),
                normal,
                point,
                depth,
                &self.solver_bodies,
                &params,
            ));
        }

        if self.env.is_empty() {
            return;
        }
        // static contacts in fragment order
        self.colliders.sort_by_key(|c| c.fragment);
        for col in self.colliders.iter() {
            self.hits.clear();
            self.env.hits(&col.center, col.radius, &mut self.hits);
            for hit in self.hits.iter() {
                let pair = ContactPair {
                    fragment: col.fragment,
                    other: Other::Static(hit.id),
                };
                if self.clusters[col.cluster as usize].asleep {
                    self.tracker.touch(pair);
                    continue;
                }
                self.contacts.push(Contact::new(
                    pair,
                    col.cluster,
                    col.fragment,
                    None,
                    -hit.normal,
                    hit.point,
                    hit.depth,
                    &self.solver_bodies,
                    &params,
                ));
            }
        }
    }

    fn check_divergence(&mut self) {
        let limit = self.cfg.divergence_speed;
        for c in self.contacts.iter() {
            if c.depth <= self.cfg.divergence_depth {
                continue;
            }
            self.diagnostics.solver_divergences += 1;
            if self.diagnostics.solver_divergences.is_power_of_two() {
                warn!(
                    "{}",
                    Anomaly::SolverDivergence {
                        pair: c.pair,
                        depth: c.depth
                    }
                );
            }
            let sides = [Some(c.a), c.b.map(|(b, _)| b)];
            for side in sides.into_iter().flatten() {
                let sb = &mut self.solver_bodies[side as usize];
                if sb.lin_vel.norm() > limit {
                    sb.lin_vel = sb.lin_vel.normalize() * limit;
                }
                if sb.ang_vel.norm() > limit {
                    sb.ang_vel = sb.ang_vel.normalize() * limit;
                }
            }
        }
    }

    /// Records contacts, loads bonds with what they delivered and flags
    /// sleeping bodies that were hit hard enough.
    fn report_contacts(&mut self) {
        let contacts = std::mem::take(&mut self.contacts);
        for c in contacts.iter() {
            self.tracker.touch(c.pair);
            let j = c.impulse().norm();
            if j <= 0. {
                continue;
            }
            self.load(c.fa, j);
            if let Some((b, fb)) = c.b {
                self.load(fb, j);
                for side in [c.a, b] {
                    let cluster = &mut self.clusters[side as usize];
                    if cluster.asleep && j > self.cfg.wake_threshold {
                        cluster.wake_pending = true;
                    }
                }
            }
        }
        self.contacts = contacts;
    }

    fn expire(&mut self) {
        let mut touched = BTreeSet::new();
        for i in 0..self.bodies.len() {
            let id = FragmentId(i as u32);
            if self.bodies[i].state == FragmentState::Inert {
                continue;
            }
            let pose = self.pose_of(id);
            if self.bounds.contains(&pose.pos) {
                continue;
            }
            let body = &mut self.bodies[i];
            body.state = body.state.next(Transition::Expire);
            body.last_pose = pose;
            touched.insert(body.cluster);
            debug!("Fragment {} left the world on tick {}.", id, self.tick);
        }
        for slot in touched {
            self.reevaluate(slot);
        }
    }

    fn track_rest(&mut self) {
        let threshold = 0.5 * self.cfg.rest_speed * self.cfg.rest_speed;
        for slot in 0..self.clusters.len() {
            let c = &mut self.clusters[slot];
            if !c.is_alive() || c.asleep {
                continue;
            }
            if c.specific_energy() < threshold {
                c.resting_ticks += 1;
            } else {
                c.resting_ticks = 0;
            }
            if c.resting_ticks < self.cfg.rest_ticks.max(1) {
                continue;
            }
            c.sleep();
            for k in 0..self.clusters[slot].members.len() {
                let f = self.clusters[slot].members[k];
                let body = &mut self.bodies[f.index()];
                body.state = body.state.next(Transition::Settle);
            }
            debug!("Cluster {} settled on tick {}.", slot, self.tick);
        }
    }

    fn refresh_counts(&mut self) {
        let (mut active, mut sleeping) = (0, 0);
        for c in self.clusters.iter().filter(|c| c.is_alive()) {
            if c.asleep {
                sleeping += 1;
            } else {
                active += 1;
            }
        }
        self.diagnostics.active_bodies = active;
        self.diagnostics.sleeping_bodies = sleeping;
        self.diagnostics.contacts = self.tracker.touching() as u32;
    }

    /// Bond keys broken so far, in table order.
    pub fn broken_bonds(&self) -> Vec<BondKey> {
        self.bonds
            .iter()
            .filter(|(_, b)| !b.connects())
            .map(|(_, b)| b.key)
            .collect()
    }
}
