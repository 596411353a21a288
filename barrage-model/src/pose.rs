use crate::{
    fragment::{FragmentId, FragmentState},
    Pose,
};

use na::{Quaternion, UnitQuaternion, Vector3};

/// One fragment's transform, laid out for direct upload.
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct PoseEntry {
    pub id: u32,
    pub state: u32,
    pub position: [f32; 3],
    /// Quaternion as `[i, j, k, w]`.
    pub rotation: [f32; 4],
}
impl PoseEntry {
    pub fn new(id: FragmentId, state: FragmentState, pose: &Pose) -> Self {
        let q = pose.ori.quaternion().coords;
        Self {
            id: id.0,
            state: state as u32,
            position: pose.pos.into(),
            rotation: [q.x, q.y, q.z, q.w],
        }
    }
    pub fn fragment(&self) -> FragmentId {
        FragmentId(self.id)
    }
    pub fn state(&self) -> Option<FragmentState> {
        FragmentState::try_from(self.state).ok()
    }
    pub fn pose(&self) -> Pose {
        let [i, j, k, w] = self.rotation;
        Pose {
            pos: Vector3::from(self.position),
            ori: UnitQuaternion::new_normalize(Quaternion::new(w, i, j, k)),
        }
    }
}

/// Counters accumulated over the life of an instance.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Triggers discarded because their target no longer exists.
    pub unknown_targets: u64,
    /// Impulses too weak to wake a settled body.
    pub absorbed_impulses: u64,
    pub solver_divergences: u64,
    /// Breaks refused once the active body cap was reached.
    pub refused_breaks: u64,
    pub broken_bonds: u64,
    pub active_bodies: u32,
    pub sleeping_bodies: u32,
    pub contacts: u32,
}

/// Every fragment's transform for one completed tick, ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSnapshot {
    pub tick: u64,
    pub entries: Vec<PoseEntry>,
    pub diagnostics: Diagnostics,
}
impl PoseSnapshot {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            tick: 0,
            entries: Vec::with_capacity(n),
            diagnostics: Diagnostics::default(),
        }
    }
    /// Starts rewriting the snapshot for `tick`, reusing its allocation.
    pub fn begin(&mut self, tick: u64) {
        self.tick = tick;
        self.entries.clear();
    }
    pub fn push(&mut self, entry: PoseEntry) {
        self.entries.push(entry);
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn get(&self, id: FragmentId) -> Option<&PoseEntry> {
        self.entries
            .get(id.index())
            .filter(|e| e.id == id.0)
            .or_else(|| self.entries.iter().find(|e| e.id == id.0))
    }
    pub fn iter(&self) -> std::slice::Iter<'_, PoseEntry> {
        self.entries.iter()
    }
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn entry_preserves_pose() {
        let pose = Pose::new(
            Vector3::new(1., 2., 3.),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3),
        );
        let e = PoseEntry::new(FragmentId(4), FragmentState::Detached, &pose);
        assert_eq!(e.fragment(), FragmentId(4));
        assert_eq!(e.state(), Some(FragmentState::Detached));
        let back = e.pose();
        assert_eq!(back.pos, pose.pos);
        assert_relative_eq!(back.ori.angle_to(&pose.ori), 0., epsilon = 1e-5);
    }

    #[test]
    fn bytes_cover_every_entry() {
        let mut s = PoseSnapshot::with_capacity(2);
        s.begin(7);
        for i in 0..2 {
            s.push(PoseEntry::new(FragmentId(i), FragmentState::Bonded, &Pose::identity()));
        }
        assert_eq!(s.as_bytes().len(), 2 * std::mem::size_of::<PoseEntry>());
        assert_eq!(std::mem::size_of::<PoseEntry>(), 36);
        assert_eq!(s.get(FragmentId(1)).map(|e| e.id), Some(1));
        assert!(s.get(FragmentId(5)).is_none());
        s.begin(8);
        assert!(s.is_empty());
        assert_eq!(s.tick, 8);
    }
}
