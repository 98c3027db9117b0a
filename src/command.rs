use cgmath::Vector2;
use strum_macros::EnumIter;

use crate::params::{ADJUST_GRAVITY_STEP, ADJUST_VISCOSITY_STEP};

/// Purely a display hint; does not alter physics (SPEC_FULL.md §4.8).
///
/// Small `strum`-derived mode-selection enum, mirroring the teacher's own
/// `EnumIter` use (`strum::IntoEnumIterator` in `gui/mod.rs`) for UI mode
/// pickers, even though the UI itself is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ColorMode {
    Density,
    Pressure,
    Velocity,
}

impl Default for ColorMode {
    fn default() -> Self {
        ColorMode::Density
    }
}

/// The four literally-specified scenario presets (SPEC_FULL.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ScenarioTag {
    DamBreak,
    WaterDrop,
    DoubleDamBreak,
    Fountain,
}

/// One command per input event from the (out-of-scope) input layer, applied
/// at a step boundary (SPEC_FULL.md §4.8, §6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePause,
    ToggleGravity,
    AdjustGravity(f32),
    AdjustViscosity(f32),
    SetColorMode(ColorMode),
    Zoom(f32),
    SpawnCluster { center: Vector2<f32>, radius: f32, count: usize },
    DeleteNear { center: Vector2<f32>, radius: f32 },
    LoadScenario(ScenarioTag),
    Reset,
}

impl Command {
    pub fn spawn_cluster_default(center: Vector2<f32>) -> Command {
        Command::SpawnCluster { center, radius: 0.1, count: 5 }
    }

    pub fn adjust_gravity_default(positive: bool) -> Command {
        Command::AdjustGravity(if positive { ADJUST_GRAVITY_STEP } else { -ADJUST_GRAVITY_STEP })
    }

    pub fn adjust_viscosity_default(positive: bool) -> Command {
        Command::AdjustViscosity(if positive { ADJUST_VISCOSITY_STEP } else { -ADJUST_VISCOSITY_STEP })
    }
}

/// Read-only snapshot of particle state published at a step boundary
/// (SPEC_FULL.md §4.8). Owned, not borrowed, so the out-of-scope display
/// sink can consume it on another thread without ever observing a
/// half-updated field ("copy-on-publish", SPEC_FULL.md §5).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub n: usize,
    pub positions: Vec<Vector2<f32>>,
    pub velocities: Vec<Vector2<f32>>,
    pub densities: Vec<f32>,
    pub pressures: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_color_mode_is_density() {
        assert_eq!(ColorMode::default(), ColorMode::Density);
    }

    #[test]
    fn spawn_cluster_default_matches_spec_defaults() {
        let cmd = Command::spawn_cluster_default(Vector2::new(0.0, 0.0));
        match cmd {
            Command::SpawnCluster { radius, count, .. } => {
                assert_eq!(radius, 0.1);
                assert_eq!(count, 5);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn adjust_gravity_default_uses_spec_step() {
        assert_eq!(Command::adjust_gravity_default(true), Command::AdjustGravity(1.0));
        assert_eq!(Command::adjust_gravity_default(false), Command::AdjustGravity(-1.0));
    }
}
