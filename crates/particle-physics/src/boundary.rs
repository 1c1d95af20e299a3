//! Containment constraints applied after collision resolution
//!
//! Velocity here is the per-step displacement `position - position_last`;
//! after moving a particle back inside, `position_last` is rebuilt from the
//! new velocity so the next Verlet step carries the bounce.

use glam::Vec2;

use crate::config::{BoundaryShape, DomainConfig};
use crate::constants::DISTANCE_EPSILON;
use crate::particle::Particle;
use crate::pool::ThreadPool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryConstraint {
    pub shape: BoundaryShape,
    /// Domain size used by [`BoundaryShape::Box`]
    pub size: Vec2,
    pub dampening: f32,
}

impl BoundaryConstraint {
    pub fn new(shape: BoundaryShape, domain: &DomainConfig, dampening: f32) -> Self {
        Self {
            shape,
            size: Vec2::new(domain.width, domain.height),
            dampening,
        }
    }

    /// Keep one particle inside; returns whether it had to be moved
    #[inline]
    pub fn apply(&self, p: &mut Particle) -> bool {
        match self.shape {
            BoundaryShape::Box => self.apply_box(p),
            BoundaryShape::Circle { center, radius } => self.apply_circle(p, center, radius),
        }
    }

    pub fn apply_all(&self, particles: &mut [Particle]) {
        for p in particles {
            self.apply(p);
        }
    }

    /// Apply on the pool; each particle belongs to exactly one chunk
    pub fn apply_parallel(&self, pool: &ThreadPool, particles: &mut [Particle]) {
        pool.for_each_chunk_mut(particles, |_, chunk| self.apply_all(chunk));
    }

    fn apply_box(&self, p: &mut Particle) -> bool {
        let mut position = p.position();
        let mut velocity = p.displacement();
        let r = p.radius;
        let mut hit = false;

        for axis in 0..2 {
            let max = self.size[axis] - r;
            if position[axis] < r {
                position[axis] = r;
                velocity[axis] = -self.dampening * velocity[axis];
                hit = true;
            } else if position[axis] > max {
                position[axis] = max;
                velocity[axis] = -self.dampening * velocity[axis];
                hit = true;
            }
        }

        if hit {
            p.set_position(position);
            p.set_displacement(velocity);
        }
        hit
    }

    fn apply_circle(&self, p: &mut Particle, center: Vec2, radius: f32) -> bool {
        let offset = p.position() - center;
        let dist = offset.length();
        let limit = radius - p.radius;
        if dist <= limit {
            return false;
        }

        let n = offset / dist.max(DISTANCE_EPSILON);
        let tangent = n.perp();
        let velocity = p.displacement();

        p.set_position(center + n * limit);
        // radial part is dropped, tangential part is damped
        p.set_displacement(tangent * (velocity.dot(tangent) * self.dampening));
        true
    }
}
