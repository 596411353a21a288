use crate::{RegionId, Target, TriggerEvent, TriggerKind};

use model::fragment::FragmentId;
use na::Vector3;

use cb::channel::{self, Receiver, Sender, TryRecvError, TrySendError};
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    sync::{
        atomic::{self, AtomicU64},
        Arc,
    },
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("the event queue is full")]
    Full,
    #[error("the simulation instance is gone")]
    Disconnected,
}

#[derive(Debug)]
struct Envelope {
    event: TriggerEvent,
    fire_at: Option<u64>,
}

/// Thread-safe handle for submitting triggers. Blocking methods wait for
/// room in the queue; `try_` methods fail with [`DispatchError::Full`]
/// instead.
#[derive(Debug, Clone)]
pub struct Submitter {
    tx: Sender<Envelope>,
    seq: Arc<AtomicU64>,
}

impl Submitter {
    fn envelope(
        &self,
        target: Target,
        impulse: Vector3<f32>,
        timestamp: f64,
        kind: TriggerKind,
        fire_at: Option<u64>,
    ) -> Envelope {
        Envelope {
            event: TriggerEvent {
                target,
                impulse,
                timestamp,
                kind,
                seq: self.seq.fetch_add(1, atomic::Ordering::Relaxed),
            },
            fire_at,
        }
    }

    fn send(&self, e: Envelope) -> Result<u64, DispatchError> {
        let seq = e.event.seq;
        self.tx.send(e).map_err(|_| DispatchError::Disconnected)?;
        Ok(seq)
    }

    fn try_send(&self, e: Envelope) -> Result<u64, DispatchError> {
        let seq = e.event.seq;
        self.tx.try_send(e).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::Full,
            TrySendError::Disconnected(_) => DispatchError::Disconnected,
        })?;
        Ok(seq)
    }

    /// Queues an impact on one fragment. Returns the event's sequence number.
    pub fn submit_impulse(
        &self,
        target: FragmentId,
        impulse: Vector3<f32>,
        timestamp: f64,
    ) -> Result<u64, DispatchError> {
        self.send(self.envelope(Target::Fragment(target), impulse, timestamp, TriggerKind::Impact, None))
    }
    pub fn try_submit_impulse(
        &self,
        target: FragmentId,
        impulse: Vector3<f32>,
        timestamp: f64,
    ) -> Result<u64, DispatchError> {
        self.try_send(self.envelope(Target::Fragment(target), impulse, timestamp, TriggerKind::Impact, None))
    }

    /// Damages every fragment inside a configured region.
    pub fn submit_damage(&self, region: RegionId, magnitude: f32) -> Result<u64, DispatchError> {
        self.send(self.damage(Target::Region(region), magnitude))
    }
    pub fn try_submit_damage(&self, region: RegionId, magnitude: f32) -> Result<u64, DispatchError> {
        self.try_send(self.damage(Target::Region(region), magnitude))
    }

    /// Damages every fragment within `radius` of `center`.
    pub fn submit_blast(
        &self,
        center: Vector3<f32>,
        radius: f32,
        magnitude: f32,
    ) -> Result<u64, DispatchError> {
        self.send(self.damage(Target::Sphere { center, radius }, magnitude))
    }
    pub fn try_submit_blast(
        &self,
        center: Vector3<f32>,
        radius: f32,
        magnitude: f32,
    ) -> Result<u64, DispatchError> {
        self.try_send(self.damage(Target::Sphere { center, radius }, magnitude))
    }

    /// Queues a scripted trigger on any kind of target.
    pub fn submit_scripted(
        &self,
        target: Target,
        impulse: Vector3<f32>,
        timestamp: f64,
    ) -> Result<u64, DispatchError> {
        self.send(self.envelope(target, impulse, timestamp, TriggerKind::Scripted, None))
    }
    pub fn try_submit_scripted(
        &self,
        target: Target,
        impulse: Vector3<f32>,
        timestamp: f64,
    ) -> Result<u64, DispatchError> {
        self.try_send(self.envelope(target, impulse, timestamp, TriggerKind::Scripted, None))
    }

    /// Holds an impulse back until the drain for `fire_at` or later.
    pub fn submit_timed(
        &self,
        target: Target,
        impulse: Vector3<f32>,
        fire_at: u64,
    ) -> Result<u64, DispatchError> {
        self.send(self.envelope(target, impulse, 0., TriggerKind::Timer, Some(fire_at)))
    }
    pub fn try_submit_timed(
        &self,
        target: Target,
        impulse: Vector3<f32>,
        fire_at: u64,
    ) -> Result<u64, DispatchError> {
        self.try_send(self.envelope(target, impulse, 0., TriggerKind::Timer, Some(fire_at)))
    }

    fn damage(&self, target: Target, magnitude: f32) -> Envelope {
        self.envelope(target, Vector3::y() * magnitude, 0., TriggerKind::Damage, None)
    }
}

#[derive(Debug)]
struct Timed {
    fire_at: u64,
    event: TriggerEvent,
}
impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Timed {}
impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Timed {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_at, self.event.seq).cmp(&(other.fire_at, other.event.seq))
    }
}

/// Consumer side, owned by the simulation thread.
#[derive(Debug)]
pub struct EventQueue {
    rx: Receiver<Envelope>,
    timers: BinaryHeap<Reverse<Timed>>,
    batch: Vec<TriggerEvent>,
}

/// A connected submitter and queue holding at most `capacity` undrained
/// submissions.
pub fn channel(capacity: usize) -> (Submitter, EventQueue) {
    let (tx, rx) = channel::bounded(capacity.max(1));
    (
        Submitter {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        },
        EventQueue {
            rx,
            timers: BinaryHeap::new(),
            batch: vec![],
        },
    )
}

impl EventQueue {
    /// Everything due by `tick`: timers in (fire tick, sequence) order, then
    /// the immediate submissions in sequence order.
    pub fn drain(&mut self, tick: u64) -> Vec<TriggerEvent> {
        let mut out = vec![];
        self.drain_into(tick, &mut out);
        out
    }

    pub fn drain_into(&mut self, tick: u64, out: &mut Vec<TriggerEvent>) {
        loop {
            match self.rx.try_recv() {
                Ok(Envelope {
                    event,
                    fire_at: Some(fire_at),
                }) => self.timers.push(Reverse(Timed { fire_at, event })),
                Ok(Envelope { event, fire_at: None }) => self.batch.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        while let Some(Reverse(t)) = self.timers.peek() {
            if t.fire_at > tick {
                break;
            }
            if let Some(Reverse(t)) = self.timers.pop() {
                out.push(t.event);
            }
        }
        // concurrent submitters can interleave between numbering and sending
        self.batch.sort_by_key(|e| e.seq);
        out.append(&mut self.batch);
        if !out.is_empty() {
            trace!("Drained {} events for tick {}.", out.len(), tick);
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}
