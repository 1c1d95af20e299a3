//! Uniform-grid spatial index in compressed (offsets + indices) layout
//!
//! Built with a stable counting sort:
//!
//! ```text
//! Pass 1: count      — particle → cell id, counts[cell] += 1
//! Pass 2: prefix sum — counts → cell_offsets (exclusive, num_cells + 1 entries)
//! Pass 3: scatter    — cell_indices[cell_offsets[c] + cursor[c]++] = i
//! ```
//!
//! Particles of cell `c` are `cell_indices[cell_offsets[c]..cell_offsets[c + 1]]`,
//! in their original store order. The grid is rebuilt from scratch every step.

use std::ops::Range;

use crate::config::DomainConfig;
use crate::particle::Particle;
use crate::pool::ThreadPool;

#[derive(Debug, Clone, Default)]
pub struct SpatialGrid {
    grid_width: usize,
    grid_height: usize,
    cell_offsets: Vec<u32>,
    cell_indices: Vec<u32>,
    /// Per-cell counters, reused as write cursors by the scatter pass
    counts: Vec<u32>,
}

impl SpatialGrid {
    pub fn new(domain: &DomainConfig) -> Self {
        let mut grid = Self::default();
        grid.resize(domain, 0);
        grid
    }

    /// Build a grid for `particles` in one call
    pub fn from_particles(particles: &[Particle], domain: &DomainConfig) -> Self {
        let mut grid = Self::new(domain);
        grid.rebuild(particles, domain);
        grid
    }

    fn resize(&mut self, domain: &DomainConfig, particle_count: usize) {
        self.grid_width = domain.grid_width();
        self.grid_height = domain.grid_height();
        let num_cells = self.grid_width * self.grid_height;
        self.counts.resize(num_cells, 0);
        self.cell_offsets.resize(num_cells + 1, 0);
        self.cell_indices.resize(particle_count, 0);
    }

    /// Rebuild the index from current positions
    pub fn rebuild(&mut self, particles: &[Particle], domain: &DomainConfig) {
        self.resize(domain, particles.len());
        self.counts.fill(0);
        self.count_and_scatter(particles, domain);
    }

    /// Same as [`SpatialGrid::rebuild`], clearing the counters on the pool.
    ///
    /// Only the clear is parallel; the scatter pass needs a sequential write
    /// cursor per cell.
    pub fn rebuild_with(&mut self, pool: &ThreadPool, particles: &[Particle], domain: &DomainConfig) {
        self.resize(domain, particles.len());
        pool.for_each_chunk_mut(&mut self.counts, |_, chunk| chunk.fill(0));
        self.count_and_scatter(particles, domain);
    }

    fn count_and_scatter(&mut self, particles: &[Particle], domain: &DomainConfig) {
        for p in particles {
            self.counts[domain.cell_of(p.position())] += 1;
        }

        let mut running = 0u32;
        for (offset, count) in self.cell_offsets.iter_mut().zip(&self.counts) {
            *offset = running;
            running += count;
        }
        if let Some(last) = self.cell_offsets.last_mut() {
            *last = running;
        }

        self.counts.fill(0);
        for (i, p) in particles.iter().enumerate() {
            let cell = domain.cell_of(p.position());
            let slot = self.cell_offsets[cell] + self.counts[cell];
            self.cell_indices[slot as usize] = i as u32;
            self.counts[cell] += 1;
        }
    }

    #[inline]
    pub fn grid_width(&self) -> usize {
        self.grid_width
    }

    #[inline]
    pub fn grid_height(&self) -> usize {
        self.grid_height
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.grid_width * self.grid_height
    }

    /// Number of particles indexed by the last rebuild
    #[inline]
    pub fn particle_count(&self) -> usize {
        self.cell_indices.len()
    }

    /// Exclusive prefix sum of per-cell counts (`num_cells + 1` entries)
    #[inline]
    pub fn cell_offsets(&self) -> &[u32] {
        &self.cell_offsets
    }

    /// Particle indices grouped by cell
    #[inline]
    pub fn cell_indices(&self) -> &[u32] {
        &self.cell_indices
    }

    #[inline]
    pub fn cell_range(&self, cell: usize) -> Range<usize> {
        self.cell_offsets[cell] as usize..self.cell_offsets[cell + 1] as usize
    }

    /// Indices of the particles in cell `(x, y)`
    #[inline]
    pub fn cell(&self, x: usize, y: usize) -> &[u32] {
        &self.cell_indices[self.cell_range(x + y * self.grid_width)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use rand::Rng;

    fn random_particles(n: usize, domain: &DomainConfig) -> Vec<Particle> {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| {
                let x = rng.random::<f32>() * domain.width;
                let y = rng.random::<f32>() * domain.height;
                Particle::new(Vec2::new(x, y), 1.0)
            })
            .collect()
    }

    #[test]
    fn indices_are_a_permutation_grouped_by_cell() {
        let domain = DomainConfig::new(200.0, 120.0, 8.0);
        let particles = random_particles(1500, &domain);
        let grid = SpatialGrid::from_particles(&particles, &domain);

        let mut seen = vec![false; particles.len()];
        for &i in grid.cell_indices() {
            assert!(!seen[i as usize], "index {i} appears twice");
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));

        for cell in 0..grid.num_cells() {
            for &i in &grid.cell_indices()[grid.cell_range(cell)] {
                assert_eq!(domain.cell_of(particles[i as usize].position()), cell);
            }
        }
    }

    #[test]
    fn offsets_are_monotonic_and_bounded() {
        let domain = DomainConfig::new(64.0, 64.0, 4.0);
        let particles = random_particles(300, &domain);
        let grid = SpatialGrid::from_particles(&particles, &domain);
        let offsets = grid.cell_offsets();

        assert_eq!(offsets.len(), domain.num_cells() + 1);
        assert_eq!(offsets[0], 0);
        assert_eq!(*offsets.last().unwrap(), particles.len() as u32);
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn sort_is_stable_within_a_cell() {
        let domain = DomainConfig::new(40.0, 40.0, 10.0);
        let particles = random_particles(400, &domain);
        let grid = SpatialGrid::from_particles(&particles, &domain);

        for cell in 0..grid.num_cells() {
            let members = &grid.cell_indices()[grid.cell_range(cell)];
            assert!(members.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn rebuild_follows_particle_count_changes() {
        let domain = DomainConfig::new(30.0, 30.0, 10.0);
        let mut particles = vec![
            Particle::new(Vec2::new(5.0, 5.0), 1.0),
            Particle::new(Vec2::new(25.0, 25.0), 1.0),
        ];
        let mut grid = SpatialGrid::from_particles(&particles, &domain);
        assert_eq!(grid.cell(0, 0), &[0]);
        assert_eq!(grid.cell(2, 2), &[1]);

        particles.push(Particle::new(Vec2::new(6.0, 6.0), 1.0));
        particles[0].set_position(Vec2::new(15.0, 5.0));
        grid.rebuild(&particles, &domain);
        assert_eq!(grid.particle_count(), 3);
        assert_eq!(grid.cell(0, 0), &[2]);
        assert_eq!(grid.cell(1, 0), &[0]);
        assert_eq!(grid.cell_offsets()[grid.num_cells()], 3);
    }

    #[test]
    fn out_of_domain_particles_land_in_edge_cells() {
        let domain = DomainConfig::new(30.0, 30.0, 10.0);
        let particles = vec![
            Particle::new(Vec2::new(-4.0, 12.0), 1.0),
            Particle::new(Vec2::new(45.0, 95.0), 1.0),
        ];
        let grid = SpatialGrid::from_particles(&particles, &domain);
        assert_eq!(grid.cell(0, 1), &[0]);
        assert_eq!(grid.cell(2, 2), &[1]);
    }

    #[test]
    fn parallel_clear_matches_serial_rebuild() {
        let domain = DomainConfig::new(128.0, 96.0, 6.0);
        let particles = random_particles(2000, &domain);
        let pool = ThreadPool::new(3).unwrap();

        let serial = SpatialGrid::from_particles(&particles, &domain);
        let mut pooled = SpatialGrid::new(&domain);
        pooled.rebuild_with(&pool, &particles, &domain);

        assert_eq!(serial.cell_offsets(), pooled.cell_offsets());
        assert_eq!(serial.cell_indices(), pooled.cell_indices());
    }
}
