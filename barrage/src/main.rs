//! Headless demo: shatters a slab over a floor, hits it, and logs what the
//! debris does for a few seconds.

use std::{
    env::args,
    time::{Duration, Instant},
};

use barrage::{Barrage, EnvConfig, FragmentId, FragmentState, InstanceConfig, SourceVolume, Vec3};
use log::LevelFilter;
use simple_logger::SimpleLogger;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

const RUN_TIME: Duration = Duration::from_secs(3);
const REPORT_EVERY: Duration = Duration::from_millis(250);

fn config() -> Result<InstanceConfig, barrage::ConfigError> {
    match args().nth(1) {
        Some(path) => InstanceConfig::load(path),
        None => {
            let mut cfg = InstanceConfig::default();
            cfg.environment = EnvConfig::floor(-0.5);
            Ok(cfg)
        }
    }
}

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("Logger unavailable: {}", e);
    }
    let cfg = match config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let slab = SourceVolume::cuboid(Vec3::new(1., 0.25, 0.5)).with_toughness(20.);
    let (instance, submitter, mut poses) = match Barrage::spawn(&slab, &cfg) {
        Ok(parts) => parts,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = submitter.submit_impulse(FragmentId(0), Vec3::new(0., 40., 0.), 0.) {
        error!("Opening strike refused: {}", e);
    }
    if let Err(e) = submitter.submit_blast(Vec3::new(0.8, 0., 0.), 0.6, 60.) {
        error!("Blast refused: {}", e);
    }

    let start = Instant::now();
    while start.elapsed() < RUN_TIME {
        std::thread::sleep(REPORT_EVERY);
        let snap = poses.latest();
        let settled = snap
            .iter()
            .filter(|e| e.state() == Some(FragmentState::Settled))
            .count();
        let lowest = snap
            .iter()
            .map(|e| e.position[1])
            .fold(f32::INFINITY, f32::min);
        info!(
            "tick {}: {} active, {} asleep, {} settled fragments, lowest at y = {:.3}",
            snap.tick, snap.diagnostics.active_bodies, snap.diagnostics.sleeping_bodies, settled, lowest
        );
        let contacts = instance.contacts().try_iter().count();
        debug!("{} contact events since the last report.", contacts);
    }

    match instance.destroy() {
        Ok(sim) => info!(
            "Done after {} ticks with {} bodies; {:?}",
            sim.tick(),
            sim.cluster_count(),
            sim.diagnostics()
        ),
        Err(e) => error!("{}", e),
    }
}
