use cgmath::Vector2;
use rand::Rng;

use crate::command::ScenarioTag;
use crate::particle_store::ParticleStore;
use crate::params::SimulationParameters;

/// Default scenario: a 71×71 lattice at spacing 0.02, centered on the world
/// origin (SPEC_FULL.md §6).
pub fn spawn_default(store: &mut ParticleStore, params: &SimulationParameters) {
    let cols = 71;
    let rows = 71;
    let spacing = 0.02;
    let origin = Vector2::new(-(cols as f32 - 1.0) * spacing / 2.0, -(rows as f32 - 1.0) * spacing / 2.0);
    store.spawn_grid(cols, rows, spacing, origin, params.particle_radius, params.m);
}

/// Loads one of the four literally-specified scenario presets
/// (SPEC_FULL.md §6). `rng` supplies the small random perturbation the
/// spec permits (§1 Non-goals: "deterministic reproducibility... some
/// random initial perturbation is permitted").
pub fn load_scenario(store: &mut ParticleStore, params: &SimulationParameters, tag: ScenarioTag, rng: &mut impl Rng) {
    match tag {
        ScenarioTag::DamBreak => spawn_dam_break(store, params),
        ScenarioTag::WaterDrop => spawn_water_drop(store, params, rng),
        ScenarioTag::DoubleDamBreak => spawn_double_dam_break(store, params),
        ScenarioTag::Fountain => store.clear(),
    }
}

/// 71×71 lattice at `(-0.5, -0.5)`, spacing 0.02, zero velocity.
pub fn spawn_dam_break(store: &mut ParticleStore, params: &SimulationParameters) {
    store.spawn_grid(71, 71, 0.02, Vector2::new(-0.5, -0.5), params.particle_radius, params.m);
}

/// Disc of radius 0.3 centered at `(0, 0.5)`, velocity `(0, -1)`.
pub fn spawn_water_drop(store: &mut ParticleStore, params: &SimulationParameters, rng: &mut impl Rng) {
    store.clear();
    let center = Vector2::new(0.0, 0.5);
    let radius = 0.3;
    let spacing = 0.02;
    let steps = (radius / spacing).ceil() as i64;
    for gy in -steps..=steps {
        for gx in -steps..=steps {
            let offset = Vector2::new(gx as f32 * spacing, gy as f32 * spacing);
            if cgmath::dot(offset, offset) > radius * radius {
                continue;
            }
            let jitter = Vector2::new(rng.gen_range(-0.001..0.001), rng.gen_range(-0.001..0.001));
            store.add(center + offset + jitter, Vector2::new(0.0, -1.0), params.particle_radius, params.m, 0.0);
        }
    }
}

/// Two 35×71 blocks, spacing 0.02, at `x ∈ {-0.8, ...}` and `x ∈ {0.1, ...}`.
pub fn spawn_double_dam_break(store: &mut ParticleStore, params: &SimulationParameters) {
    store.clear();
    let spacing = 0.02;
    let cols = 35;
    let rows = 71;
    for x_origin in [-0.8f32, 0.1f32] {
        for r in 0..rows {
            for c in 0..cols {
                let pos = Vector2::new(x_origin + c as f32 * spacing, -0.5 + r as f32 * spacing);
                store.add(pos, Vector2::new(0.0, 0.0), params.particle_radius, params.m, 0.0);
            }
        }
    }
}

/// Drives the `Fountain` scenario's continuous spawn: while the store is
/// empty, emits one particle every 100 ms at `(0, 0.8)` with velocity
/// `(0, -3)` (SPEC_FULL.md §6). `elapsed` is the real wall-clock time since
/// the last call, supplied by the (out-of-scope) owning application loop,
/// since the crate itself has no frame clock.
pub struct FountainEmitter {
    accumulated: std::time::Duration,
}

impl FountainEmitter {
    const PERIOD: std::time::Duration = std::time::Duration::from_millis(100);

    pub fn new() -> Self {
        FountainEmitter {
            accumulated: std::time::Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = std::time::Duration::ZERO;
    }

    pub fn tick(&mut self, store: &mut ParticleStore, params: &SimulationParameters, elapsed: std::time::Duration) {
        if !store.is_empty() {
            return;
        }
        self.accumulated += elapsed;
        while self.accumulated >= Self::PERIOD {
            self.accumulated -= Self::PERIOD;
            store.add(Vector2::new(0.0, 0.8), Vector2::new(0.0, -3.0), params.particle_radius, params.m, 0.0);
        }
    }
}

impl Default for FountainEmitter {
    fn default() -> Self {
        FountainEmitter::new()
    }
}
