//! # KillableThread
//!
//! A KillableThread is a thread with a built-in interruption mechanism. The
//! thread body is handed a [`KillSignal`] that it polls at points where
//! stopping is safe; [`KillSwitch`]es trip it from anywhere.

use std::{
    io,
    thread::JoinHandle,
    time::{Duration, Instant},
};

use cb::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Requests that a thread stop at its next check. Cheap to clone and safe
/// to use from any thread, any number of times.
#[derive(Debug, Clone)]
pub struct KillSwitch(Sender<()>);
impl KillSwitch {
    pub fn kill(&self) {
        // a full channel already holds a pending kill
        let _ = self.0.try_send(());
    }
}

/// The thread's side of the kill mechanism. Latches once tripped. Dropping
/// every switch also counts as a kill.
#[derive(Debug)]
pub struct KillSignal {
    rx: Receiver<()>,
    killed: bool,
}
impl KillSignal {
    pub fn is_killed(&mut self) -> bool {
        if !self.killed {
            self.killed = match self.rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => true,
                Err(TryRecvError::Empty) => false,
            };
        }
        self.killed
    }
    /// Sleeps until `deadline`, waking early on a kill. Returns whether the
    /// thread was killed.
    pub fn wait_until(&mut self, deadline: Instant) -> bool {
        if !self.killed {
            self.killed = match self.rx.recv_deadline(deadline) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            };
        }
        self.killed
    }
}

/// What a fixed rate body wants after a tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

/// Alias for the return of `finish` in `KillableThread`.
pub type FinishResult<T> = std::thread::Result<T>;

/// A `KillableThread`. Effectively a `JoinHandle` to the thread started by when creating
/// `KillableThread`.
#[derive(Debug)]
pub struct KillableThread<T: Send + 'static> {
    kill_mechanism: KillSwitch,
    handle: Option<JoinHandle<T>>,
    name: String,
}
impl<T: Send + 'static> KillableThread<T> {
    /// Creates a `KillableThread`.
    ///
    /// # Arguments
    ///
    /// * `name` Name of the KillableThread. Used during debugging only.
    /// * `f` The function being run by the thread.
    ///
    /// # Remarks
    ///
    /// The body must poll the signal itself; nothing preempts it.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<KillableThread<T>>
    where
        F: FnOnce(KillSignal) -> T + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = channel::bounded(1);
        let signal = KillSignal { rx, killed: false };
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || f(signal))?;
        debug!("Spawned thread {}.", name);
        Ok(KillableThread {
            kill_mechanism: KillSwitch(tx),
            handle: Some(handle),
            name,
        })
    }

    pub fn kill_switch(&self) -> KillSwitch {
        self.kill_mechanism.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Kills the thread and joins it.
    pub fn finish(mut self) -> FinishResult<T> {
        self.kill_mechanism.kill();
        match self.handle.take() {
            Some(h) => h.join(),
            None => unreachable!("{} was already joined", self.name),
        }
    }
}
impl<T: Send + 'static> Drop for KillableThread<T> {
    fn drop(&mut self) {
        if let Some(h) = self.handle.take() {
            warn!("Thread {} dropped without `finish`; joining it.", self.name);
            self.kill_mechanism.kill();
            if h.join().is_err() {
                error!("Thread {} panicked.", self.name);
            }
        }
    }
}

/// Runs `tick` every `period` on a new thread until killed or until `tick`
/// asks to stop, then hands `state` back through `finish`.
///
/// Deadlines advance by whole periods so that sleeping does not accumulate
/// drift. When a tick overruns, the schedule restarts from the current
/// instant instead of bursting to catch up. Kills are only observed between
/// ticks.
pub fn fixed_rate<S, F>(
    name: impl Into<String>,
    period: Duration,
    state: S,
    mut tick: F,
) -> io::Result<KillableThread<S>>
where
    S: Send + 'static,
    F: FnMut(&mut S) -> Control + Send + 'static,
{
    let name = name.into();
    let label = name.clone();
    KillableThread::spawn(name, move |mut signal| {
        let mut state = state;
        let mut deadline = Instant::now();
        let mut overruns = 0u64;
        while !signal.is_killed() {
            if tick(&mut state) == Control::Stop {
                debug!("{} stopped itself.", label);
                break;
            }
            deadline += period;
            let now = Instant::now();
            if now > deadline {
                overruns += 1;
                let behind = now - deadline;
                if overruns.is_power_of_two() {
                    warn!(
                        "{} fell {:?} behind schedule ({} overruns); resynchronising.",
                        label, behind, overruns
                    );
                }
                deadline = now;
            }
            if signal.wait_until(deadline) {
                break;
            }
        }
        info!("{} completed.", label);
        state
    })
}
