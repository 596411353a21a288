use std::time::Duration;

use crate::config::{ConfigError, InstanceConfig};

use cb::channel::{self, Receiver, Sender, TrySendError};
use events::{EventQueue, RegionMap, Submitter, TriggerEvent};
use model::{geom::volume::SourceVolume, pose::PoseSnapshot};
use sim::{ContactEvent, Simulation};
use th::{Control, KillSwitch, KillableThread};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("could not start the simulation thread")]
    Spawn(#[from] std::io::Error),
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("the simulation thread panicked")]
    Panicked,
}

/// Consumer side of the pose buffer.
#[derive(Debug)]
pub struct PoseReader(sync::Reader<PoseSnapshot>);
impl PoseReader {
    /// The newest complete snapshot.
    pub fn latest(&mut self) -> &PoseSnapshot {
        self.0.latest()
    }
    /// The snapshot returned by the last `latest`.
    pub fn current(&self) -> &PoseSnapshot {
        self.0.front()
    }
}

fn build(volume: &SourceVolume, cfg: &InstanceConfig) -> Result<(Simulation, Submitter, EventQueue), InstanceError> {
    cfg.validate()?;
    let graph = shatter::shatter_or_whole(volume, &cfg.fracture);
    let regions = RegionMap::new(cfg.dispatcher.regions.clone());
    let sim = Simulation::new(graph, cfg.simulation.clone(), &cfg.environment, regions);
    let (submitter, queue) = events::channel(cfg.dispatcher.queue_capacity);
    Ok((sim, submitter, queue))
}

/// One tick: drain, step.
fn advance(sim: &mut Simulation, queue: &mut EventQueue, batch: &mut Vec<TriggerEvent>) {
    batch.clear();
    queue.drain_into(sim.tick() + 1, batch);
    sim.step(batch);
}

/// What the simulation thread owns.
struct Running {
    sim: Simulation,
    queue: EventQueue,
    poses: sync::Editor<PoseSnapshot>,
    contacts: Sender<ContactEvent>,
    dropped_contacts: u64,
    batch: Vec<TriggerEvent>,
}
impl Running {
    fn tick(&mut self) -> Control {
        advance(&mut self.sim, &mut self.queue, &mut self.batch);
        self.sim.write_snapshot(self.poses.back_mut());
        self.poses.publish();
        for ev in self.sim.contact_events() {
            match self.contacts.try_send(*ev) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped_contacts += 1;
                    if self.dropped_contacts.is_power_of_two() {
                        debug!("Contact buffer full; {} events dropped so far.", self.dropped_contacts);
                    }
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }
        Control::Continue
    }
}

/// A running instance: one fractured body ticking on its own thread.
pub struct Barrage {
    thread: KillableThread<Running>,
    contacts: Receiver<ContactEvent>,
}

impl Barrage {
    /// Shatters `volume` and starts simulating it. Triggers go in through
    /// the returned `Submitter`; poses come out through the `PoseReader`.
    pub fn spawn(volume: &SourceVolume, cfg: &InstanceConfig) -> Result<(Barrage, Submitter, PoseReader), InstanceError> {
        let (sim, submitter, queue) = build(volume, cfg)?;
        let (reader, poses) = sync::buffer(sim.snapshot());
        let (contacts_tx, contacts) = channel::bounded(cfg.dispatcher.contact_capacity.max(1));
        let period = Duration::from_secs_f32(cfg.simulation.tick_duration);
        info!(
            "Spawning instance with {} fragments at {:?} per tick.",
            sim.fragments().len(),
            period
        );
        let running = Running {
            sim,
            queue,
            poses,
            contacts: contacts_tx,
            dropped_contacts: 0,
            batch: vec![],
        };
        let thread = th::fixed_rate("barrage-sim", period, running, Running::tick)?;
        Ok((Barrage { thread, contacts }, submitter, PoseReader(reader)))
    }

    /// Stops the instance at the next tick boundary when triggered, from any
    /// thread.
    pub fn kill_switch(&self) -> KillSwitch {
        self.thread.kill_switch()
    }

    pub fn contacts(&self) -> &Receiver<ContactEvent> {
        &self.contacts
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Stops the thread after its current tick and hands back the
    /// simulation. Submitting afterwards fails with `Disconnected`.
    pub fn destroy(self) -> Result<Simulation, InstanceError> {
        let running = self.thread.finish().map_err(|_| InstanceError::Panicked)?;
        info!(
            "Instance destroyed after {} ticks: {:?}",
            running.sim.tick(),
            running.sim.diagnostics()
        );
        Ok(running.sim)
    }
}

/// Drives a simulation on the caller's thread, one tick per `step`.
pub struct Stepper {
    sim: Simulation,
    queue: EventQueue,
    batch: Vec<TriggerEvent>,
}

impl Stepper {
    pub fn new(volume: &SourceVolume, cfg: &InstanceConfig) -> Result<(Stepper, Submitter), InstanceError> {
        let (sim, submitter, queue) = build(volume, cfg)?;
        Ok((
            Stepper {
                sim,
                queue,
                batch: vec![],
            },
            submitter,
        ))
    }

    pub fn step(&mut self) -> &Simulation {
        advance(&mut self.sim, &mut self.queue, &mut self.batch);
        &self.sim
    }

    pub fn run(&mut self, ticks: u64) -> &Simulation {
        for _ in 0..ticks {
            advance(&mut self.sim, &mut self.queue, &mut self.batch);
        }
        &self.sim
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// For tuning bonds between ticks.
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn snapshot(&self) -> PoseSnapshot {
        self.sim.snapshot()
    }

    pub fn into_simulation(self) -> Simulation {
        self.sim
    }
}
