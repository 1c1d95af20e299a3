//! Circle-overlap collision resolution
//!
//! Broad phase walks the grid with a half-neighbourhood stencil so every pair
//! of neighbouring cells is visited from one side only:
//!
//! ```text
//!        x-1   x   x+1
//!   y     .    #    #
//!   y+1   #    #    #
//! ```
//!
//! Narrow phase pushes overlapping pairs apart along their center line. The
//! correction moves positions only; the implied velocity change is picked up
//! by the next Verlet step.
//!
//! The parallel solver dispatches even rows, waits, then dispatches odd rows.
//! A row's stencil touches only that row and the one below, so rows of the
//! same parity never share a cell.

use glam::Vec2;

use crate::constants::DISTANCE_EPSILON;
use crate::grid::SpatialGrid;
use crate::particle::Particle;
use crate::pool::ThreadPool;

/// Cell offsets visited from each cell
pub const NEIGHBOR_STENCIL: [(isize, isize); 5] = [(0, 0), (1, 0), (0, 1), (1, 1), (-1, 1)];

/// Push two particles apart if they overlap.
///
/// Each particle moves by `response * overlap` along the center line, in
/// opposite directions. Returns whether a correction was applied.
#[inline]
pub fn resolve_pair(a: &mut Particle, b: &mut Particle, response: f32) -> bool {
    let v = a.position() - b.position();
    let dist_sq = v.length_squared();
    let min_dist = a.radius + b.radius;
    if dist_sq >= min_dist * min_dist {
        return false;
    }

    let dist = dist_sq.sqrt().max(DISTANCE_EPSILON);
    let correction = response * (min_dist - dist);
    if correction <= 0.0 {
        return false;
    }

    let n: Vec2 = v / dist;
    a.translate(n * correction);
    b.translate(-n * correction);
    true
}

/// O(n²) scan over every unordered pair, for validation and small stores
pub fn solve_all_pairs(particles: &mut [Particle], response: f32) -> usize {
    let mut corrections = 0;
    for i in 0..particles.len() {
        let (head, tail) = particles.split_at_mut(i + 1);
        let a = &mut head[i];
        for b in tail.iter_mut() {
            if resolve_pair(a, b, response) {
                corrections += 1;
            }
        }
    }
    corrections
}

/// Raw view of the particle store shared by row workers.
#[derive(Clone, Copy)]
struct SharedParticles {
    ptr: *mut Particle,
    len: usize,
}

// SAFETY: workers only dereference indices inside cells of the rows they own,
// and concurrently running rows never share a cell (row-parity dispatch).
unsafe impl Send for SharedParticles {}
unsafe impl Sync for SharedParticles {}

impl SharedParticles {
    fn new(particles: &mut [Particle]) -> Self {
        Self {
            ptr: particles.as_mut_ptr(),
            len: particles.len(),
        }
    }

    /// # Safety
    /// `i != j`, both in bounds, and no other thread touches either particle.
    #[inline]
    unsafe fn pair(&self, i: usize, j: usize) -> (&mut Particle, &mut Particle) {
        debug_assert!(i != j && i < self.len && j < self.len);
        (&mut *self.ptr.add(i), &mut *self.ptr.add(j))
    }
}

/// Grid-accelerated collision solver
#[derive(Debug, Clone, Copy)]
pub struct CollisionSolver {
    pub response: f32,
}

impl CollisionSolver {
    pub fn new(response: f32) -> Self {
        Self { response }
    }

    /// Resolve collisions row by row on the calling thread
    pub fn solve(&self, particles: &mut [Particle], grid: &SpatialGrid) {
        assert_eq!(particles.len(), grid.particle_count(), "grid is stale");
        let shared = SharedParticles::new(particles);
        for y in 0..grid.grid_height() {
            // SAFETY: single thread, exclusive borrow of `particles`
            unsafe { self.solve_row(shared, grid, y) };
        }
    }

    /// Resolve collisions with even rows in parallel, then odd rows in parallel
    pub fn solve_parallel(&self, pool: &ThreadPool, particles: &mut [Particle], grid: &SpatialGrid) {
        assert_eq!(particles.len(), grid.particle_count(), "grid is stale");
        let shared = SharedParticles::new(particles);
        let rows = grid.grid_height();

        for parity in 0..2 {
            let pass_rows = (rows + 1 - parity) / 2;
            pool.parallel_for(pass_rows, |range| {
                for k in range {
                    // SAFETY: rows 2k + parity are pairwise non-adjacent within a pass
                    unsafe { self.solve_row(shared, grid, 2 * k + parity) };
                }
            });
        }
    }

    /// # Safety
    /// No other thread may touch particles in rows `y` or `y + 1` meanwhile.
    unsafe fn solve_row(&self, particles: SharedParticles, grid: &SpatialGrid, y: usize) {
        for x in 0..grid.grid_width() {
            self.solve_cell(particles, grid, x, y);
        }
    }

    unsafe fn solve_cell(&self, particles: SharedParticles, grid: &SpatialGrid, x: usize, y: usize) {
        let width = grid.grid_width() as isize;
        let height = grid.grid_height() as isize;

        for &p1 in grid.cell(x, y) {
            for &(dx, dy) in &NEIGHBOR_STENCIL {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                if nx < 0 || nx >= width || ny >= height {
                    continue;
                }
                for &p2 in grid.cell(nx as usize, ny as usize) {
                    if p1 == p2 {
                        continue;
                    }
                    let (a, b) = particles.pair(p1 as usize, p2 as usize);
                    resolve_pair(a, b, self.response);
                }
            }
        }
    }
}
