use cgmath::{InnerSpace, Vector2};

use crate::kernels;
use crate::params::SimulationParameters;
use crate::particle_store::ParticleStore;
use crate::spatial_grid::SpatialGrid;
use crate::work_scheduler::{UnsafeSlice, WorkScheduler};

/// Stack/caller-owned neighbor buffer. 256 entries is a deliberate design
/// choice to avoid heap traffic in the hot per-particle loops (SPEC_FULL.md
/// §9 "Neighbor overflow").
pub const NEIGHBOR_BUFFER_CAP: usize = 256;

/// Runs the SPH density/pressure/force pipeline over a `ParticleStore` and
/// `SpatialGrid` (SPEC_FULL.md §4.4). Stateless: all mutable state lives in
/// the `ParticleStore` it's handed each call.
pub struct SphSolver;

impl SphSolver {
    /// For each particle, sums `m * W_poly6(r_ij, h)` over queried
    /// neighbors plus the self-contribution `m * W_poly6(0, h)`.
    pub fn compute_densities(store: &mut ParticleStore, grid: &SpatialGrid, params: &SimulationParameters, scheduler: &WorkScheduler) {
        let n = store.len();
        let positions = store.positions.clone();
        let h = params.h;
        let m = params.m;
        let self_density = m * kernels::poly6_from_r_sq(0.0, h);

        let densities = UnsafeSlice::new(&mut store.densities);
        scheduler.parallel_for(0, n, |i| {
            let mut neighbors = [0usize; NEIGHBOR_BUFFER_CAP];
            let count = grid.query_neighbors(i, &positions, &mut neighbors);
            let mut density = self_density;
            for &j in &neighbors[..count] {
                let d = positions[j] - positions[i];
                let r_sq = cgmath::dot(d, d);
                density += m * kernels::poly6_from_r_sq(r_sq, h);
            }
            // SAFETY: each iteration writes only index `i`; see WorkScheduler's contract.
            unsafe {
                *densities.get_mut(i) = density;
            }
        });
    }

    /// Tait EOS: `pressure[i] = max(0, B * ((density[i]/rho_0)^gamma - 1))`.
    pub fn compute_pressures(store: &mut ParticleStore, params: &SimulationParameters, scheduler: &WorkScheduler) {
        let n = store.len();
        let densities = store.densities.clone();
        let rho_0 = params.rho_0;
        let b = params.b;
        let gamma = params.gamma;

        let pressures = UnsafeSlice::new(&mut store.pressures);
        scheduler.parallel_for(0, n, |i| {
            let ratio = densities[i] / rho_0;
            let p = b * (ratio.powf(gamma) - 1.0);
            unsafe {
                *pressures.get_mut(i) = p.max(0.0);
            }
        });
    }

    /// Adds `-m * (P_i + P_j) / (2*rho_j) * grad_W_spiky(r_ij, h) / density[i]`
    /// to `acceleration[i]`, summed over neighbors `j != i` within `h`.
    pub fn accumulate_pressure_forces(store: &mut ParticleStore, grid: &SpatialGrid, params: &SimulationParameters, scheduler: &WorkScheduler) {
        let n = store.len();
        let positions = store.positions.clone();
        let densities = store.densities.clone();
        let pressures = store.pressures.clone();
        let h = params.h;
        let m = params.m;

        let accelerations = UnsafeSlice::new(&mut store.accelerations);
        scheduler.parallel_for(0, n, |i| {
            let mut neighbors = [0usize; NEIGHBOR_BUFFER_CAP];
            let count = grid.query_neighbors(i, &positions, &mut neighbors);
            let mut force = Vector2::new(0.0f32, 0.0);
            for &j in &neighbors[..count] {
                let r_vec = positions[i] - positions[j];
                let r = r_vec.magnitude();
                let grad = kernels::spiky_gradient_with_r(r_vec, r, h);
                let term = (pressures[i] + pressures[j]) / (2.0 * densities[j].max(f32::EPSILON));
                force -= grad * (m * term);
            }
            let density_i = densities[i].max(f32::EPSILON);
            let contribution = force / density_i;
            // SAFETY: each iteration writes only index `i`.
            unsafe {
                *accelerations.get_mut(i) += contribution;
            }
        });
    }

    /// Adds `mu * m * (v_j - v_i) / rho_j * laplacian_W_viscosity(r_ij, h) /
    /// density[i]` to `acceleration[i]`, then clamps `|acceleration[i]|` to
    /// `max_acceleration` (direction preserved).
    pub fn accumulate_viscosity_forces(store: &mut ParticleStore, grid: &SpatialGrid, params: &SimulationParameters, scheduler: &WorkScheduler) {
        let n = store.len();
        let positions = store.positions.clone();
        let velocities = store.velocities.clone();
        let densities = store.densities.clone();
        let h = params.h;
        let m = params.m;
        let mu = params.mu;
        let max_accel = params.max_acceleration;

        let accelerations = UnsafeSlice::new(&mut store.accelerations);
        scheduler.parallel_for(0, n, |i| {
            let mut neighbors = [0usize; NEIGHBOR_BUFFER_CAP];
            let count = grid.query_neighbors(i, &positions, &mut neighbors);
            let mut force = Vector2::new(0.0f32, 0.0);
            for &j in &neighbors[..count] {
                let d = positions[j] - positions[i];
                let r = d.magnitude();
                let lap = kernels::viscosity_laplacian_from_r(r, h);
                force += (velocities[j] - velocities[i]) / densities[j].max(f32::EPSILON) * (m * lap);
            }
            let density_i = densities[i].max(f32::EPSILON);
            let contribution = force * (mu / density_i);

            // SAFETY: each iteration writes only index `i`.
            unsafe {
                let a = accelerations.get_mut(i);
                *a += contribution;
                let mag = a.magnitude();
                if mag > max_accel && mag > 0.0 {
                    *a *= max_accel / mag;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_grid::OutOfRangePolicy;

    fn scheduler() -> WorkScheduler {
        WorkScheduler::new()
    }

    fn grid_for(store: &ParticleStore, h: f32) -> SpatialGrid {
        let mut grid = SpatialGrid::new(Vector2::new(-2.0, -2.0), 4.0, 4.0, h, OutOfRangePolicy::ClampToEdge);
        grid.rebuild(&store.positions);
        grid
    }

    #[test]
    fn single_particle_density_is_self_contribution_only() {
        let params = SimulationParameters::default();
        let mut store = ParticleStore::new();
        store.add(Vector2::new(0.0, 0.0), Vector2::new(0.0, 0.0), 0.01, params.m, 0.0);
        let grid = grid_for(&store, params.h);
        SphSolver::compute_densities(&mut store, &grid, &params, &scheduler());
        let expected = params.m * kernels::poly6_from_r_sq(0.0, params.h);
        assert!((store.densities[0] - expected).abs() < 1e-6);
    }

    #[test]
    fn pressure_is_clamped_nonnegative_below_rest_density() {
        let params = SimulationParameters::default();
        let mut store = ParticleStore::new();
        store.add(Vector2::new(0.0, 0.0), Vector2::new(0.0, 0.0), 0.01, params.m, 0.0);
        store.densities[0] = params.rho_0 * 0.1;
        SphSolver::compute_pressures(&mut store, &params, &scheduler());
        assert_eq!(store.pressures[0], 0.0);
    }

    #[test]
    fn two_identical_particles_feel_no_net_pressure_asymmetry() {
        let params = SimulationParameters::default();
        let mut store = ParticleStore::new();
        store.add(Vector2::new(0.0, 0.0), Vector2::new(0.0, 0.0), 0.01, params.m, 0.0);
        store.add(Vector2::new(0.01, 0.0), Vector2::new(0.0, 0.0), 0.01, params.m, 0.0);
        let grid = grid_for(&store, params.h);
        let sched = scheduler();
        SphSolver::compute_densities(&mut store, &grid, &params, &sched);
        SphSolver::compute_pressures(&mut store, &params, &sched);
        SphSolver::accumulate_pressure_forces(&mut store, &grid, &params, &sched);
        let a0 = store.accelerations[0];
        let a1 = store.accelerations[1];
        assert!((a0.x + a1.x).abs() < 1e-3);
        assert!((a0.y + a1.y).abs() < 1e-6);
    }

    #[test]
    fn viscosity_clamps_acceleration_magnitude() {
        let mut params = SimulationParameters::default();
        params.max_acceleration = 1.0;
        params.mu = 1000.0;
        let mut store = ParticleStore::new();
        store.add(Vector2::new(0.0, 0.0), Vector2::new(0.0, 0.0), 0.01, params.m, 0.0);
        store.add(Vector2::new(0.01, 0.0), Vector2::new(50.0, 0.0), 0.01, params.m, 0.0);
        let grid = grid_for(&store, params.h);
        let sched = scheduler();
        SphSolver::compute_densities(&mut store, &grid, &params, &sched);
        SphSolver::accumulate_viscosity_forces(&mut store, &grid, &params, &sched);
        assert!(store.accelerations[0].magnitude() <= params.max_acceleration + 1e-4);
    }
}
