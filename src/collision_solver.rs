use cgmath::{InnerSpace, Vector2};

use crate::collision_pair_cache::CollisionPairCache;
use crate::particle_store::ParticleStore;

/// Discrete-collision-mode response logic (SPEC_FULL.md §4.5): swept-distance
/// pair collisions with a dot-product-projection elastic impulse, predictive
/// wall reflection, and cached-pair position-based overlap resolution.
///
/// Grounded in `original_source`'s `physics.c::collision` /
/// `src/physics/collision.c::resolve_particle_collision` — the
/// dot-product-projection variant, per REDESIGN FLAGS (the corpus's other
/// mass-ratio-only formula is not used).
pub struct CollisionSolver;

impl CollisionSolver {
    /// Swept-position distance test plus an "approaching" dot-product test;
    /// on contact, applies the elastic impulse and records `(a, b)` in
    /// `cache`.
    pub fn predict_and_respond(store: &mut ParticleStore, cache: &mut CollisionPairCache, a: usize, b: usize, dt: f32, restitution: f32) {
        let pa = store.positions[a] + store.velocities[a] * dt;
        let pb = store.positions[b] + store.velocities[b] * dt;
        let swept = (pb - pa).magnitude();
        if swept > store.radius[a] + store.radius[b] {
            return;
        }

        let dx = store.positions[a] - store.positions[b];
        let dv = store.velocities[a] - store.velocities[b];
        // d/dt |dx|^2 = 2 * dot(dv, dx); the pair is closing in (approaching)
        // exactly when that rate is negative.
        let approaching = cgmath::dot(dv, dx);
        if approaching >= 0.0 {
            return;
        }

        let distance_sq = cgmath::dot(dx, dx);
        if distance_sq <= 0.0 {
            return;
        }

        let ma = store.mass[a];
        let mb = store.mass[b];
        let collision_scale = 2.0 * approaching / ((ma + mb) * distance_sq);

        let va = store.velocities[a];
        let vb = store.velocities[b];
        store.velocities[a] = (va - dx * (mb * collision_scale)) * restitution;
        store.velocities[b] = (vb + dx * (ma * collision_scale)) * restitution;

        cache.push(a, b);
    }

    /// Predictive 1D reflection against the four domain walls.
    pub fn wall_response(position: Vector2<f32>, velocity: &mut Vector2<f32>, radius: f32, dt: f32, domain_min: Vector2<f32>, domain_max: Vector2<f32>, restitution_wall: f32) {
        if position.y + radius + velocity.y * dt >= domain_max.y && velocity.y > 0.0 {
            velocity.y = -restitution_wall * velocity.y;
        }
        if position.y - radius + velocity.y * dt <= domain_min.y && velocity.y < 0.0 {
            velocity.y = -restitution_wall * velocity.y;
        }
        if position.x + radius + velocity.x * dt >= domain_max.x && velocity.x > 0.0 {
            velocity.x = -restitution_wall * velocity.x;
        }
        if position.x - radius + velocity.x * dt <= domain_min.x && velocity.x < 0.0 {
            velocity.x = -restitution_wall * velocity.x;
        }
    }

    /// Iterates at most `max_iter` times over `cache`'s pairs, pushing
    /// overlapping positions apart along the contact normal in proportion
    /// to the other particle's mass share; exits early once the maximum
    /// penetration this iteration is below `1e-4` or no correction was made.
    /// Afterwards clamps every particle into `[min + r, max - r]` and zeros
    /// the outward velocity component on clamped sides.
    pub fn resolve_overlaps_cached(store: &mut ParticleStore, cache: &CollisionPairCache, max_iter: usize, domain_min: Vector2<f32>, domain_max: Vector2<f32>) {
        const SUB_RELAXATION: f32 = 0.5;
        const CONVERGED_PENETRATION: f32 = 1e-4;

        for _ in 0..max_iter {
            let mut max_penetration = 0.0f32;
            let mut any_correction = false;

            for &(a, b) in cache.pairs() {
                let d = store.positions[b] - store.positions[a];
                let dist_sq = cgmath::dot(d, d);
                let min_dist = store.radius[a] + store.radius[b];
                if dist_sq >= min_dist * min_dist {
                    continue;
                }
                let dist = dist_sq.sqrt();
                let penetration = min_dist - dist;
                max_penetration = max_penetration.max(penetration);

                let normal = if dist > 1e-9 { d / dist } else { Vector2::new(1.0, 0.0) };
                let correction = penetration * SUB_RELAXATION;
                let total_mass = store.mass[a] + store.mass[b];
                if total_mass <= 0.0 {
                    continue;
                }
                let move_a = correction * (store.mass[b] / total_mass);
                let move_b = correction * (store.mass[a] / total_mass);

                store.positions[a] -= normal * move_a;
                store.positions[b] += normal * move_b;
                any_correction = true;
            }

            if max_penetration < CONVERGED_PENETRATION || !any_correction {
                break;
            }
        }

        for i in 0..store.len() {
            let r = store.radius[i];
            let pos = &mut store.positions[i];
            let vel = &mut store.velocities[i];

            if pos.x < domain_min.x + r {
                pos.x = domain_min.x + r;
                if vel.x < 0.0 {
                    vel.x = 0.0;
                }
            } else if pos.x > domain_max.x - r {
                pos.x = domain_max.x - r;
                if vel.x > 0.0 {
                    vel.x = 0.0;
                }
            }
            if pos.y < domain_min.y + r {
                pos.y = domain_min.y + r;
                if vel.y < 0.0 {
                    vel.y = 0.0;
                }
            } else if pos.y > domain_max.y - r {
                pos.y = domain_max.y - r;
                if vel.y > 0.0 {
                    vel.y = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_pair(pos_a: Vector2<f32>, vel_a: Vector2<f32>, pos_b: Vector2<f32>, vel_b: Vector2<f32>) -> ParticleStore {
        let mut store = ParticleStore::new();
        store.add(pos_a, vel_a, 0.01, 1.0, 0.0);
        store.add(pos_b, vel_b, 0.01, 1.0, 0.0);
        store
    }

    #[test]
    fn head_on_equal_mass_collision_swaps_velocities_exactly() {
        let mut store = store_with_pair(
            Vector2::new(0.49, 0.5),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.51, 0.5),
            Vector2::new(-1.0, 0.0),
        );
        let mut cache = CollisionPairCache::with_capacity_for(2);
        CollisionSolver::predict_and_respond(&mut store, &mut cache, 0, 1, 0.01, 1.0);

        assert!((store.velocities[0].x - (-1.0)).abs() < 1e-5);
        assert!((store.velocities[1].x - 1.0).abs() < 1e-5);
        assert_eq!(cache.pairs().len(), 1);
    }

    #[test]
    fn separating_particles_are_not_collided() {
        let mut store = store_with_pair(
            Vector2::new(0.49, 0.5),
            Vector2::new(-1.0, 0.0),
            Vector2::new(0.51, 0.5),
            Vector2::new(1.0, 0.0),
        );
        let before = (store.velocities[0], store.velocities[1]);
        let mut cache = CollisionPairCache::with_capacity_for(2);
        CollisionSolver::predict_and_respond(&mut store, &mut cache, 0, 1, 0.01, 1.0);
        assert_eq!((store.velocities[0], store.velocities[1]), before);
        assert!(cache.pairs().is_empty());
    }

    #[test]
    fn wall_response_reflects_with_damping_at_top_wall() {
        let mut velocity = Vector2::new(0.0, 2.0);
        CollisionSolver::wall_response(
            Vector2::new(0.5, 0.99),
            &mut velocity,
            0.01,
            0.01,
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 1.0),
            0.95,
        );
        assert!((velocity.y - (-1.9)).abs() < 1e-5);
    }

    #[test]
    fn resolve_overlaps_separates_penetrating_pair() {
        let mut store = store_with_pair(
            Vector2::new(0.5, 0.5),
            Vector2::new(0.0, 0.0),
            Vector2::new(0.505, 0.5),
            Vector2::new(0.0, 0.0),
        );
        let mut cache = CollisionPairCache::with_capacity_for(2);
        cache.push(0, 1);
        CollisionSolver::resolve_overlaps_cached(&mut store, &cache, 10, Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0));
        let d = (store.positions[1] - store.positions[0]).magnitude();
        assert!(d >= 0.02 - 1e-4);
    }

    #[test]
    fn positions_clamp_to_domain_and_zero_outward_velocity() {
        let mut store = store_with_pair(
            Vector2::new(-0.05, 0.5),
            Vector2::new(-1.0, 0.0),
            Vector2::new(0.5, 0.5),
            Vector2::new(0.0, 0.0),
        );
        let cache = CollisionPairCache::with_capacity_for(2);
        CollisionSolver::resolve_overlaps_cached(&mut store, &cache, 1, Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0));
        assert!((store.positions[0].x - 0.01).abs() < 1e-6);
        assert_eq!(store.velocities[0].x, 0.0);
    }
}
