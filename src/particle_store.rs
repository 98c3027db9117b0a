use cgmath::Vector2;

use crate::error::{SimError, SimResult};

/// Owns per-particle state in structure-of-arrays form (SPEC_FULL.md §4.1).
///
/// All arrays are always identical in length; this is the load-bearing
/// invariant every operation here maintains. `radius`/`mass`/`charge` are
/// only meaningful in discrete-collision mode but are kept as full parallel
/// arrays regardless of mode, rather than `Option<Vec<_>>`, so the
/// "identical length at all observable moments" invariant from
/// SPEC_FULL.md §3 never has a carve-out to special-case.
#[derive(Debug, Default, Clone)]
pub struct ParticleStore {
    pub positions: Vec<Vector2<f32>>,
    pub velocities: Vec<Vector2<f32>>,
    pub accelerations: Vec<Vector2<f32>>,
    pub densities: Vec<f32>,
    pub pressures: Vec<f32>,

    pub radius: Vec<f32>,
    pub mass: Vec<f32>,
    pub charge: Vec<f32>,
}

impl ParticleStore {
    pub fn new() -> Self {
        ParticleStore::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Reserves capacity for `additional` more elements in every parallel
    /// array. This is the crate's one fallible array-growing operation: on
    /// allocator exhaustion it returns `SimError::AllocationFailure` instead
    /// of aborting the process outright, so a caller gets a chance to log a
    /// diagnostic before treating it as fatal. Every other growth path
    /// (`add`, `spawn_grid`, `resize`) trusts the global allocator and stays
    /// infallible.
    pub fn reserve(&mut self, additional: usize) -> SimResult<()> {
        let fail = |_| SimError::AllocationFailure { requested: additional };
        self.positions.try_reserve(additional).map_err(fail)?;
        self.velocities.try_reserve(additional).map_err(fail)?;
        self.accelerations.try_reserve(additional).map_err(fail)?;
        self.densities.try_reserve(additional).map_err(fail)?;
        self.pressures.try_reserve(additional).map_err(fail)?;
        self.radius.try_reserve(additional).map_err(fail)?;
        self.mass.try_reserve(additional).map_err(fail)?;
        self.charge.try_reserve(additional).map_err(fail)?;
        Ok(())
    }

    pub fn resize(&mut self, n: usize, default_radius: f32, default_mass: f32, default_charge: f32) {
        self.positions.resize(n, Vector2::new(0.0, 0.0));
        self.velocities.resize(n, Vector2::new(0.0, 0.0));
        self.accelerations.resize(n, Vector2::new(0.0, 0.0));
        self.densities.resize(n, 0.0);
        self.pressures.resize(n, 0.0);
        self.radius.resize(n, default_radius);
        self.mass.resize(n, default_mass);
        self.charge.resize(n, default_charge);
    }

    /// Lays out `cols × rows` particles on a regular lattice with zero
    /// velocity/acceleration/density/pressure, spacing `spacing`, with the
    /// lattice's bottom-left corner at `origin`.
    pub fn spawn_grid(&mut self, cols: usize, rows: usize, spacing: f32, origin: Vector2<f32>, default_radius: f32, default_mass: f32) {
        self.clear();
        let n = cols * rows;
        self.reserve(n).expect("particle store allocation failed");
        for r in 0..rows {
            for c in 0..cols {
                let pos = origin + Vector2::new(c as f32 * spacing, r as f32 * spacing);
                self.positions.push(pos);
                self.velocities.push(Vector2::new(0.0, 0.0));
                self.accelerations.push(Vector2::new(0.0, 0.0));
                self.densities.push(0.0);
                self.pressures.push(0.0);
                self.radius.push(default_radius);
                self.mass.push(default_mass);
                self.charge.push(0.0);
            }
        }
    }

    /// Appends one particle; all parallel arrays grow in lockstep.
    pub fn add(&mut self, position: Vector2<f32>, velocity: Vector2<f32>, radius: f32, mass: f32, charge: f32) {
        self.positions.push(position);
        self.velocities.push(velocity);
        self.accelerations.push(Vector2::new(0.0, 0.0));
        self.densities.push(0.0);
        self.pressures.push(0.0);
        self.radius.push(radius);
        self.mass.push(mass);
        self.charge.push(charge);
    }

    /// Stable in-place compact-filter: removes every particle within `r` of
    /// `center`. Runs in O(N), no allocation.
    ///
    /// Returns the number of particles removed.
    pub fn remove_within_radius(&mut self, center: Vector2<f32>, r: f32) -> usize {
        let r_sq = r * r;
        let n = self.len();
        let mut write = 0usize;
        let mut removed = 0usize;
        for read in 0..n {
            let d = self.positions[read] - center;
            if cgmath::dot(d, d) <= r_sq {
                removed += 1;
                continue;
            }
            if write != read {
                self.positions[write] = self.positions[read];
                self.velocities[write] = self.velocities[read];
                self.accelerations[write] = self.accelerations[read];
                self.densities[write] = self.densities[read];
                self.pressures[write] = self.pressures[read];
                self.radius[write] = self.radius[read];
                self.mass[write] = self.mass[read];
                self.charge[write] = self.charge[read];
            }
            write += 1;
        }
        self.positions.truncate(write);
        self.velocities.truncate(write);
        self.accelerations.truncate(write);
        self.densities.truncate(write);
        self.pressures.truncate(write);
        self.radius.truncate(write);
        self.mass.truncate(write);
        self.charge.truncate(write);
        removed
    }

    /// Empties all arrays without freeing capacity.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.accelerations.clear();
        self.densities.clear();
        self.pressures.clear();
        self.radius.clear();
        self.mass.clear();
        self.charge.clear();
    }

    /// Debug-only invariant check: every parallel array has the same length.
    pub fn assert_consistent(&self) {
        let n = self.positions.len();
        debug_assert_eq!(self.velocities.len(), n);
        debug_assert_eq!(self.accelerations.len(), n);
        debug_assert_eq!(self.densities.len(), n);
        debug_assert_eq!(self.pressures.len(), n);
        debug_assert_eq!(self.radius.len(), n);
        debug_assert_eq!(self.mass.len(), n);
        debug_assert_eq!(self.charge.len(), n);
    }
}
