use cgmath::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Value record copied cheaply at step boundaries; see SPEC_FULL.md §3/§6.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    /// Smoothing length `h`, also the SPH spatial grid's cell edge.
    pub h: f32,
    /// Particle mass `m` (SPH mode).
    pub m: f32,
    /// Rest density `ρ₀`.
    pub rho_0: f32,
    /// Tait stiffness `B`.
    pub b: f32,
    /// Tait pressure exponent `γ`.
    pub gamma: f32,
    /// Dynamic viscosity `μ`.
    pub mu: f32,
    /// Current timestep.
    pub dt: f32,
    pub dt_min: f32,
    pub dt_max: f32,
    /// CFL number used by the adaptive timestep.
    pub cfl: f32,
    /// Gravity, applied to the y component only.
    pub gravity: f32,
    /// Velocity damping factor applied on wall contact.
    pub wall_damping: f32,
    /// Magnitude clamp applied to accelerations after SPH force accumulation.
    pub max_acceleration: f32,
    /// Stability threshold on |velocity|.
    pub max_velocity: f32,
    pub adaptive_timestep: bool,

    /// Discrete-collision-mode default particle radius for spawn commands.
    pub particle_radius: f32,
    /// Discrete-collision-mode default particle mass for spawn commands.
    pub particle_mass: f32,
    /// Carried per-particle in discrete mode, unused in dynamics (see
    /// SPEC_FULL.md §3).
    pub particle_charge_default: f32,

    /// Coefficient of restitution for particle-particle collisions.
    pub restitution_particle: f32,
    /// Coefficient of restitution for particle-wall collisions.
    pub restitution_wall: f32,

    /// Lower-left corner of the simulation domain (both modes).
    pub domain_min: Vector2<f32>,
    /// Upper-right corner of the simulation domain (both modes).
    pub domain_max: Vector2<f32>,
    /// Tunable cell edge for the discrete-collision-mode spatial grid
    /// (SPEC_FULL.md §4.3: "a tunable partition size"). Independent of `h`,
    /// which is the SPH grid's cell edge.
    pub collision_cell_size: f32,
    /// `CollisionSolver::resolve_overlaps_cached`'s iteration cap.
    pub overlap_resolution_max_iter: usize,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        SimulationParameters {
            h: 0.08,
            m: 0.02,
            rho_0: 550.0,
            b: 50.0,
            gamma: 7.0,
            mu: 0.1,
            dt: 0.016,
            dt_min: 1e-4,
            dt_max: 0.01,
            cfl: 0.4,
            gravity: -9.81,
            wall_damping: 0.8,
            max_acceleration: 50.0,
            max_velocity: 100.0,
            adaptive_timestep: true,

            particle_radius: 0.01,
            particle_mass: 0.02,
            particle_charge_default: 0.0,

            restitution_particle: 1.0,
            restitution_wall: 0.95,

            domain_min: Vector2::new(-1.0, -1.0),
            domain_max: Vector2::new(1.0, 1.0),
            collision_cell_size: 0.05,
            overlap_resolution_max_iter: 4,
        }
    }
}

/// Default step sizes for the `AdjustGravity`/`AdjustViscosity` commands.
pub const ADJUST_GRAVITY_STEP: f32 = 1.0;
pub const ADJUST_VISCOSITY_STEP: f32 = 0.1;

/// A single validated update to one of `SimulationParameters`' fields,
/// dispatched through `Integrator::set_parameter` (SPEC_FULL.md §4.6's
/// `setParameter(key, value)`). Each variant routes to the matching
/// `try_set_*` validator, so there is exactly one place the validation
/// logic for a given field lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterUpdate {
    H(f32),
    Mu(f32),
    DtBounds { min: f32, max: f32 },
}

impl SimulationParameters {
    /// Validates and applies a single parameter change in place.
    ///
    /// On rejection the previous value is left untouched, per SPEC_FULL.md
    /// §7's "InvalidParameter" error kind.
    pub fn try_set_h(&mut self, h: f32) -> SimResult<()> {
        if h <= 0.0 {
            return Err(SimError::InvalidParameter {
                field: "h",
                reason: "smoothing length must be positive".into(),
            });
        }
        self.h = h;
        Ok(())
    }

    pub fn try_set_mu(&mut self, mu: f32) -> SimResult<()> {
        if mu < 0.0 {
            return Err(SimError::InvalidParameter {
                field: "mu",
                reason: "viscosity must be >= 0".into(),
            });
        }
        self.mu = mu;
        Ok(())
    }

    pub fn try_set_dt_bounds(&mut self, dt_min: f32, dt_max: f32) -> SimResult<()> {
        if dt_min <= 0.0 || dt_max <= 0.0 || dt_min > dt_max {
            return Err(SimError::InvalidParameter {
                field: "dt_min/dt_max",
                reason: format!("require 0 < dt_min ({}) <= dt_max ({})", dt_min, dt_max),
            });
        }
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        self.dt = self.dt.clamp(dt_min, dt_max);
        Ok(())
    }

    /// Adjusts gravity by `delta`, used by `Command::AdjustGravity`.
    pub fn adjust_gravity(&mut self, delta: f32) {
        self.gravity += delta;
    }

    /// Adjusts viscosity by `delta`, clamped to `>= 0`, used by
    /// `Command::AdjustViscosity`.
    pub fn adjust_viscosity(&mut self, delta: f32) {
        self.mu = (self.mu + delta).max(0.0);
    }

    /// Applies one `ParameterUpdate`, dispatching to the matching validator.
    /// On rejection the previous value is left untouched, same as every
    /// individual `try_set_*` method.
    pub fn try_apply(&mut self, update: ParameterUpdate) -> SimResult<()> {
        match update {
            ParameterUpdate::H(h) => self.try_set_h(h),
            ParameterUpdate::Mu(mu) => self.try_set_mu(mu),
            ParameterUpdate::DtBounds { min, max } => self.try_set_dt_bounds(min, max),
        }
    }

    /// Round-trips a parameter set to JSON, for saving/loading a
    /// configuration (SPEC_FULL.md §2.3).
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("SimulationParameters always serializes")
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json).map_err(|err| SimError::InvalidParameter {
            field: "json",
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let p = SimulationParameters::default();
        assert_eq!(p.h, 0.08);
        assert_eq!(p.rho_0, 550.0);
        assert_eq!(p.gamma, 7.0);
        assert!(p.adaptive_timestep);
    }

    #[test]
    fn rejects_invalid_h() {
        let mut p = SimulationParameters::default();
        let before = p.h;
        assert!(p.try_set_h(-1.0).is_err());
        assert_eq!(p.h, before);
    }

    #[test]
    fn rejects_negative_mu() {
        let mut p = SimulationParameters::default();
        let before = p.mu;
        assert!(p.try_set_mu(-0.5).is_err());
        assert_eq!(p.mu, before);
    }

    #[test]
    fn rejects_inverted_dt_bounds() {
        let mut p = SimulationParameters::default();
        assert!(p.try_set_dt_bounds(0.02, 0.001).is_err());
    }

    #[test]
    fn try_apply_dispatches_to_the_matching_validator() {
        let mut p = SimulationParameters::default();
        assert!(p.try_apply(ParameterUpdate::Mu(0.25)).is_ok());
        assert_eq!(p.mu, 0.25);

        let before = p.mu;
        assert!(p.try_apply(ParameterUpdate::Mu(-1.0)).is_err());
        assert_eq!(p.mu, before);

        assert!(p.try_apply(ParameterUpdate::DtBounds { min: 0.02, max: 0.001 }).is_err());
    }

    #[test]
    fn adjust_viscosity_clamps_at_zero() {
        let mut p = SimulationParameters::default();
        p.mu = 0.05;
        p.adjust_viscosity(-1.0);
        assert_eq!(p.mu, 0.0);
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let mut p = SimulationParameters::default();
        p.mu = 0.42;
        let json = p.to_json();
        let restored = SimulationParameters::from_json(&json).unwrap();
        assert_eq!(p, restored);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(SimulationParameters::from_json("not json").is_err());
    }
}
