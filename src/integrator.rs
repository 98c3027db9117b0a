use cgmath::{InnerSpace, Vector2};
use rand::Rng;

use crate::collision_pair_cache::CollisionPairCache;
use crate::collision_solver::CollisionSolver;
use crate::command::{Command, ScenarioTag, Snapshot};
use crate::error::SimResult;
use crate::params::{ParameterUpdate, SimulationParameters};
use crate::particle_store::ParticleStore;
use crate::scenario::{self, FountainEmitter};
use crate::spatial_grid::{OutOfRangePolicy, SpatialGrid};
use crate::sph_solver::SphSolver;
use crate::work_scheduler::WorkScheduler;

/// Running/Paused state machine (SPEC_FULL.md §4.6). Pause freezes physics
/// but still drains input commands and republishes the last snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationStatus {
    Running,
    Paused,
}

/// Orchestrates the per-step pipeline over a `ParticleStore`, in either SPH
/// or discrete-collision mode (SPEC_FULL.md §2, §4.6). Owns the spatial
/// grid, collision-pair cache, command queue, and scheduler; this is the
/// crate's `Simulation` aggregate's innermost driver.
pub struct Integrator {
    pub store: ParticleStore,
    params: SimulationParameters,
    pub status: SimulationStatus,

    grid: SpatialGrid,
    collision_cache: CollisionPairCache,
    scheduler: WorkScheduler,
    fountain: FountainEmitter,
    pending_commands: Vec<Command>,
    gravity_before_toggle: Option<f32>,
    last_reset_step: Option<u64>,
    step_index: u64,
    rng: rand::rngs::SmallRng,
}

impl Integrator {
    pub fn new(params: SimulationParameters) -> Self {
        let mut store = ParticleStore::new();
        scenario::spawn_default(&mut store, &params);
        let grid = Self::make_sph_grid(&params);
        Integrator {
            store,
            params,
            status: SimulationStatus::Running,
            grid,
            collision_cache: CollisionPairCache::with_capacity_for(0),
            scheduler: WorkScheduler::new(),
            fountain: FountainEmitter::new(),
            pending_commands: Vec::new(),
            gravity_before_toggle: None,
            last_reset_step: None,
            step_index: 0,
            rng: rand::SeedableRng::seed_from_u64(0xC0FFEE),
        }
    }

    fn make_sph_grid(params: &SimulationParameters) -> SpatialGrid {
        let size = params.domain_max - params.domain_min;
        SpatialGrid::new(params.domain_min, size.x, size.y, params.h, OutOfRangePolicy::ClampToEdge)
    }

    fn make_collision_grid(params: &SimulationParameters) -> SpatialGrid {
        let size = params.domain_max - params.domain_min;
        SpatialGrid::new(params.domain_min, size.x, size.y, params.collision_cell_size, OutOfRangePolicy::Drop)
    }

    pub fn last_reset_step(&self) -> Option<u64> {
        self.last_reset_step
    }

    /// Queues a command for application at the next step boundary.
    pub fn queue_command(&mut self, command: Command) {
        self.pending_commands.push(command);
    }

    /// Drains and applies every queued command. Called once per step,
    /// between steps, never mid-step (SPEC_FULL.md §5).
    fn apply_pending_commands(&mut self) {
        let commands = std::mem::take(&mut self.pending_commands);
        for command in commands {
            self.apply_command(command);
        }
    }

    pub fn apply_command(&mut self, command: Command) {
        match command {
            Command::TogglePause => {
                self.status = match self.status {
                    SimulationStatus::Running => SimulationStatus::Paused,
                    SimulationStatus::Paused => SimulationStatus::Running,
                };
            }
            Command::ToggleGravity => {
                if self.params.gravity != 0.0 {
                    self.gravity_before_toggle = Some(self.params.gravity);
                    self.params.gravity = 0.0;
                } else if let Some(previous) = self.gravity_before_toggle.take() {
                    self.params.gravity = previous;
                }
            }
            Command::AdjustGravity(delta) => self.params.adjust_gravity(delta),
            Command::AdjustViscosity(delta) => self.params.adjust_viscosity(delta),
            Command::SetColorMode(_) | Command::Zoom(_) => {
                // Display hints only; no physics effect (SPEC_FULL.md §4.8).
            }
            Command::SpawnCluster { center, radius, count } => self.spawn_cluster(center, radius, count),
            Command::DeleteNear { center, radius } => {
                let center = self.clamp_to_domain(center);
                self.store.remove_within_radius(center, radius.max(0.0));
            }
            Command::LoadScenario(tag) => {
                scenario::load_scenario(&mut self.store, &self.params, tag, &mut self.rng);
                self.fountain.reset();
                self.grid = Self::make_sph_grid(&self.params);
            }
            Command::Reset => {
                scenario::spawn_default(&mut self.store, &self.params);
                self.fountain.reset();
                self.grid = Self::make_sph_grid(&self.params);
                self.status = SimulationStatus::Running;
            }
        }
    }

    /// Clamps a command-supplied world point into the domain
    /// (SPEC_FULL.md §7 "CommandOutOfRange").
    fn clamp_to_domain(&self, point: Vector2<f32>) -> Vector2<f32> {
        Vector2::new(
            point.x.clamp(self.params.domain_min.x, self.params.domain_max.x),
            point.y.clamp(self.params.domain_min.y, self.params.domain_max.y),
        )
    }

    fn spawn_cluster(&mut self, center: Vector2<f32>, radius: f32, count: usize) {
        let center = self.clamp_to_domain(center);
        let radius = radius.max(0.0);
        for _ in 0..count {
            let offset = if radius > 0.0 {
                Vector2::new(self.rng.gen_range(-radius..radius), self.rng.gen_range(-radius..radius))
            } else {
                Vector2::new(0.0, 0.0)
            };
            let position = self.clamp_to_domain(center + offset);
            self.store.add(position, Vector2::new(0.0, 0.0), self.params.particle_radius, self.params.particle_mass, self.params.particle_charge_default);
        }
    }

    /// Advances the `Fountain` scenario's spawn timer by `elapsed` real time;
    /// a no-op while the store is non-empty.
    pub fn tick_fountain(&mut self, elapsed: std::time::Duration) {
        self.fountain.tick(&mut self.store, &self.params, elapsed);
    }

    /// Runs one SPH-mode step: `rebuild → densities → pressures →
    /// reset-accelerations → pressure forces → viscosity forces → gravity →
    /// adaptive dt → stability check (reset if invalid) → kick1+drift →
    /// walls → kick2`, per SPEC_FULL.md §2's per-step dataflow.
    pub fn step_sph(&mut self) {
        self.apply_pending_commands();
        if self.status == SimulationStatus::Paused {
            return;
        }
        if self.store.is_empty() {
            self.step_index += 1;
            return;
        }

        self.grid.rebuild(&self.store.positions);
        SphSolver::compute_densities(&mut self.store, &self.grid, &self.params, &self.scheduler);
        SphSolver::compute_pressures(&mut self.store, &self.params, &self.scheduler);
        self.reset_accelerations();
        SphSolver::accumulate_pressure_forces(&mut self.store, &self.grid, &self.params, &self.scheduler);
        SphSolver::accumulate_viscosity_forces(&mut self.store, &self.grid, &self.params, &self.scheduler);
        self.apply_gravity();

        if self.params.adaptive_timestep {
            self.params.dt = self.compute_adaptive_dt();
        }
        let dt = self.params.dt;

        if !self.validate_state() {
            log::warn!("stability violation at step {}: resetting to default lattice", self.step_index);
            scenario::spawn_default(&mut self.store, &self.params);
            self.fountain.reset();
            self.last_reset_step = Some(self.step_index);
            self.step_index += 1;
            return;
        }

        self.verlet_kick1_and_drift(dt);
        self.handle_walls_sph(dt);
        self.verlet_kick2(dt);

        self.step_index += 1;
    }

    fn reset_accelerations(&mut self) {
        for a in &mut self.store.accelerations {
            *a = Vector2::new(0.0, 0.0);
        }
    }

    fn apply_gravity(&mut self) {
        let gravity = Vector2::new(0.0, self.params.gravity);
        for a in &mut self.store.accelerations {
            *a += gravity;
        }
    }

    /// `CFL * h / max|v|`, clamped to `[dt_min, dt_max]`; keeps the previous
    /// `dt` when `max|v| < 1e-6`.
    fn compute_adaptive_dt(&self) -> f32 {
        let max_velocity = self
            .store
            .velocities
            .iter()
            .map(|v| v.magnitude())
            .fold(0.0f32, f32::max);
        if max_velocity < 1e-6 {
            return self.params.dt;
        }
        let adaptive = self.params.cfl * self.params.h / max_velocity;
        adaptive.clamp(self.params.dt_min, self.params.dt_max)
    }

    /// A step is stable iff every particle's |velocity| <= max_velocity,
    /// density >= 0, |position| <= 100 on both axes, and no NaN/Inf appears
    /// in position/velocity/acceleration/density/pressure.
    fn validate_state(&self) -> bool {
        const BOUND_LIMIT: f32 = 100.0;
        let store = &self.store;
        for i in 0..store.len() {
            let p = store.positions[i];
            let v = store.velocities[i];
            let a = store.accelerations[i];
            let density = store.densities[i];
            let pressure = store.pressures[i];

            if !(p.x.is_finite() && p.y.is_finite() && v.x.is_finite() && v.y.is_finite() && a.x.is_finite() && a.y.is_finite() && density.is_finite() && pressure.is_finite()) {
                return false;
            }
            if v.magnitude() > self.params.max_velocity {
                return false;
            }
            if density < 0.0 {
                return false;
            }
            if p.x.abs() > BOUND_LIMIT || p.y.abs() > BOUND_LIMIT {
                return false;
            }
        }
        true
    }

    fn verlet_kick1_and_drift(&mut self, dt: f32) {
        for i in 0..self.store.len() {
            self.store.velocities[i] += self.store.accelerations[i] * (0.5 * dt);
            self.store.positions[i] += self.store.velocities[i] * dt;
        }
    }

    fn verlet_kick2(&mut self, dt: f32) {
        for i in 0..self.store.len() {
            self.store.velocities[i] += self.store.accelerations[i] * (0.5 * dt);
        }
    }

    fn handle_walls_sph(&mut self, _dt: f32) {
        let min = self.params.domain_min;
        let max = self.params.domain_max;
        let damping = self.params.wall_damping;
        for i in 0..self.store.len() {
            let pos = &mut self.store.positions[i];
            let vel = &mut self.store.velocities[i];
            if pos.x < min.x {
                pos.x = min.x;
                vel.x *= -damping;
            } else if pos.x > max.x {
                pos.x = max.x;
                vel.x *= -damping;
            }
            if pos.y < min.y {
                pos.y = min.y;
                vel.y *= -damping;
            } else if pos.y > max.y {
                pos.y = max.y;
                vel.y *= -damping;
            }
        }
    }

    /// Runs one discrete-collision-mode step: velocity-kick + pairwise
    /// collision test against same-cell + 8-neighbor cells, predictive wall
    /// bounce, cached-pair overlap resolution, and a final re-bucket
    /// (handled implicitly by next step's `rebuild`), per SPEC_FULL.md §2.
    pub fn step_discrete(&mut self, dt: f32) {
        self.apply_pending_commands();
        if self.status == SimulationStatus::Paused {
            return;
        }
        if self.store.is_empty() {
            self.step_index += 1;
            return;
        }

        let mut grid = Self::make_collision_grid(&self.params);
        grid.rebuild(&self.store.positions);

        self.collision_cache = CollisionPairCache::with_capacity_for(self.store.len());

        let gravity = Vector2::new(0.0, self.params.gravity);
        for i in 0..self.store.len() {
            self.store.velocities[i] += gravity * dt;
        }

        let n = self.store.len();
        for i in 0..n {
            let mut neighbors = [0usize; crate::sph_solver::NEIGHBOR_BUFFER_CAP];
            let count = grid.query_neighbors(i, &self.store.positions, &mut neighbors);
            for k in 0..count {
                let j = neighbors[k];
                if j <= i {
                    continue;
                }
                CollisionSolver::predict_and_respond(&mut self.store, &mut self.collision_cache, i, j, dt, self.params.restitution_particle);
            }
        }

        for i in 0..self.store.len() {
            let position = self.store.positions[i];
            let radius = self.store.radius[i];
            CollisionSolver::wall_response(position, &mut self.store.velocities[i], radius, dt, self.params.domain_min, self.params.domain_max, self.params.restitution_wall);
        }

        for i in 0..self.store.len() {
            self.store.positions[i] += self.store.velocities[i] * dt;
        }

        CollisionSolver::resolve_overlaps_cached(&mut self.store, &self.collision_cache, self.params.overlap_resolution_max_iter, self.params.domain_min, self.params.domain_max);

        self.step_index += 1;
    }

    /// Read-only snapshot of the current particle state, published at the
    /// step boundary (SPEC_FULL.md §4.8).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            n: self.store.len(),
            positions: self.store.positions.clone(),
            velocities: self.store.velocities.clone(),
            densities: self.store.densities.clone(),
            pressures: self.store.pressures.clone(),
        }
    }

    /// Read-only view of the current parameter set. Mutation only ever
    /// happens through `set_parameter`/the per-field `try_set_*` wrappers,
    /// so a validated value (e.g. `dt_min <= dt_max`) can never be bypassed
    /// by writing the field directly (SPEC_FULL.md §7).
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Validates and applies one parameter update (SPEC_FULL.md §4.6's
    /// `setParameter(key, value)`). On rejection the previous value is
    /// retained. `h` changes also rebuild the SPH grid, since its cell size
    /// is `h`.
    pub fn set_parameter(&mut self, update: ParameterUpdate) -> SimResult<()> {
        self.params.try_apply(update)?;
        if matches!(update, ParameterUpdate::H(_)) {
            self.grid = Self::make_sph_grid(&self.params);
        }
        Ok(())
    }

    pub fn try_set_h(&mut self, h: f32) -> SimResult<()> {
        self.set_parameter(ParameterUpdate::H(h))
    }

    pub fn try_set_mu(&mut self, mu: f32) -> SimResult<()> {
        self.set_parameter(ParameterUpdate::Mu(mu))
    }

    pub fn try_set_dt_bounds(&mut self, dt_min: f32, dt_max: f32) -> SimResult<()> {
        self.set_parameter(ParameterUpdate::DtBounds { min: dt_min, max: dt_max })
    }
}
