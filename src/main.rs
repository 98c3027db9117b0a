//! Headless demo driver: runs the SPH engine for a fixed number of steps
//! and logs step statistics. The display sink, GPU rasterization, and input
//! layer are out of scope for this crate (SPEC_FULL.md §1); this binary
//! exists only to exercise `Integrator` the way the teacher crate's own
//! `main.rs` drove its simulation loop.

use cgmath::InnerSpace;
use fluidsim2d::{Integrator, SimulationParameters};

fn main() {
    env_logger::init();

    let params = SimulationParameters::default();
    let mut integrator = Integrator::new(params);

    let steps = 200;
    log::info!("running {} steps with {} particles", steps, integrator.store.len());

    for step in 0..steps {
        integrator.step_sph();
        if step % 50 == 0 {
            let snapshot = integrator.snapshot();
            let max_speed = snapshot.velocities.iter().map(|v| v.magnitude()).fold(0.0f32, f32::max);
            log::info!("step {}: n={} dt={:.5} max|v|={:.4}", step, snapshot.n, integrator.params().dt, max_speed);
        }
    }

    if let Some(reset_step) = integrator.last_reset_step() {
        log::warn!("a stability reset occurred at step {}", reset_step);
    }
}
