use cgmath::Vector2;

/// `0` is reserved for "cell never populated"; see SPEC_FULL.md §3.
const NEVER_POPULATED: u32 = 0;

/// Policy for what happens when a particle's cell coordinate falls outside
/// `[0, cols) × [0, rows)` (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutOfRangePolicy {
    /// Clamp to the nearest edge cell. Used by the SPH grid, so no particle
    /// is ever un-indexable.
    ClampToEdge,
    /// Drop the insert silently; the particle is simply not findable as a
    /// neighbor this step. Used by the discrete-collision grid, which
    /// clamps positions to the domain every step anyway, so any
    /// out-of-range excursion is transient.
    Drop,
}

#[derive(Debug, Default, Clone)]
struct Cell {
    generation: u32,
    indices: Vec<usize>,
}

/// Uniform cell hash over the simulation domain, with versioned cells so a
/// `rebuild` doesn't need to clear every cell every step (SPEC_FULL.md §4.3,
/// §9 "cell-version trick").
pub struct SpatialGrid {
    origin: Vector2<f32>,
    cell_size: f32,
    cols: usize,
    rows: usize,
    out_of_range: OutOfRangePolicy,
    cells: Vec<Cell>,
    current_generation: u32,
}

impl SpatialGrid {
    pub fn new(origin: Vector2<f32>, width: f32, height: f32, cell_size: f32, out_of_range: OutOfRangePolicy) -> Self {
        let cols = (width / cell_size).ceil().max(1.0) as usize;
        let rows = (height / cell_size).ceil().max(1.0) as usize;
        SpatialGrid {
            origin,
            cell_size,
            cols,
            rows,
            out_of_range,
            cells: vec![Cell::default(); cols * rows],
            // Start at 1 so that a never-rebuilt grid's cells (generation 0)
            // are correctly "empty" relative to `current_generation`.
            current_generation: 1,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Computes the (possibly out-of-range) integer cell coordinate for a
    /// world position, before clamping/dropping is applied.
    fn raw_cell_coord(&self, position: Vector2<f32>) -> (i64, i64) {
        let local = position - self.origin;
        (
            (local.x / self.cell_size).floor() as i64,
            (local.y / self.cell_size).floor() as i64,
        )
    }

    /// Resolves a raw cell coordinate to a linear cell index according to
    /// `out_of_range`, or `None` if the policy says to drop the insert.
    fn resolve_cell_index(&self, cx: i64, cy: i64) -> Option<usize> {
        let in_range = cx >= 0 && cy >= 0 && (cx as usize) < self.cols && (cy as usize) < self.rows;
        if in_range {
            return Some(cy as usize * self.cols + cx as usize);
        }
        match self.out_of_range {
            OutOfRangePolicy::Drop => None,
            OutOfRangePolicy::ClampToEdge => {
                let cx = cx.clamp(0, self.cols as i64 - 1) as usize;
                let cy = cy.clamp(0, self.rows as i64 - 1) as usize;
                Some(cy * self.cols + cx)
            }
        }
    }

    /// Increments `current_generation` before every rebuild; handles the
    /// wrap-around case by walking all cells once to re-zero their tags.
    fn advance_generation(&mut self) {
        let (next, overflowed) = self.current_generation.overflowing_add(1);
        if overflowed || next == NEVER_POPULATED {
            for cell in &mut self.cells {
                cell.generation = NEVER_POPULATED;
            }
            self.current_generation = 1;
        } else {
            self.current_generation = next;
        }
    }

    /// Rebuilds the grid from scratch for the given positions. Lazily
    /// "clears" each touched cell the first time it's seen this generation,
    /// so cost is O(touched cells), not O(all cells).
    pub fn rebuild(&mut self, positions: &[Vector2<f32>]) {
        self.advance_generation();
        for (i, &position) in positions.iter().enumerate() {
            let (cx, cy) = self.raw_cell_coord(position);
            let Some(cell_index) = self.resolve_cell_index(cx, cy) else {
                continue;
            };
            let cell = &mut self.cells[cell_index];
            if cell.generation != self.current_generation {
                cell.generation = self.current_generation;
                cell.indices.clear();
            }
            cell.indices.push(i);
        }
    }

    fn cell_coord_clamped(&self, position: Vector2<f32>) -> (usize, usize) {
        let (cx, cy) = self.raw_cell_coord(position);
        (
            cx.clamp(0, self.cols as i64 - 1) as usize,
            cy.clamp(0, self.rows as i64 - 1) as usize,
        )
    }

    /// Scans the 3×3 cell block centered on particle `i`'s cell, streaming
    /// same-generation indices `j != i` whose squared distance to
    /// `positions[i]` is less than `cell_size²` into `out`, up to `out.len()`
    /// entries. Returns the count written; extra neighbors are silently
    /// dropped (SPEC_FULL.md §4.3 / §9).
    pub fn query_neighbors(&self, i: usize, positions: &[Vector2<f32>], out: &mut [usize]) -> usize {
        let cap = out.len();
        if cap == 0 {
            return 0;
        }
        let (cx, cy) = self.cell_coord_clamped(positions[i]);
        let cell_size_sq = self.cell_size * self.cell_size;
        let mut count = 0usize;

        'outer: for dy in -1i64..=1 {
            let ny = cy as i64 + dy;
            if ny < 0 || ny as usize >= self.rows {
                continue;
            }
            for dx in -1i64..=1 {
                let nx = cx as i64 + dx;
                if nx < 0 || nx as usize >= self.cols {
                    continue;
                }
                let cell = &self.cells[ny as usize * self.cols + nx as usize];
                if cell.generation != self.current_generation {
                    continue;
                }
                for &j in &cell.indices {
                    if j == i {
                        continue;
                    }
                    let d = positions[j] - positions[i];
                    if cgmath::dot(d, d) < cell_size_sq {
                        out[count] = j;
                        count += 1;
                        if count == cap {
                            break 'outer;
                        }
                    }
                }
            }
        }
        count
    }

    /// Debug/test helper: the multiset of indices currently stored across
    /// all live (current-generation) cells.
    #[cfg(test)]
    fn all_indices(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .cells
            .iter()
            .filter(|c| c.generation == self.current_generation)
            .flat_map(|c| c.indices.iter().copied())
            .collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_grid() -> SpatialGrid {
        SpatialGrid::new(Vector2::new(0.0, 0.0), 1.0, 1.0, 0.1, OutOfRangePolicy::ClampToEdge)
    }

    #[test]
    fn rebuild_covers_every_index_exactly_once() {
        let mut grid = make_grid();
        let positions = vec![
            Vector2::new(0.05, 0.05),
            Vector2::new(0.55, 0.55),
            Vector2::new(0.95, 0.95),
            Vector2::new(0.15, 0.85),
        ];
        grid.rebuild(&positions);
        assert_eq!(grid.all_indices(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn rebuild_is_idempotent_across_repeated_calls() {
        let mut grid = make_grid();
        let positions = vec![Vector2::new(0.22, 0.37), Vector2::new(0.61, 0.02), Vector2::new(0.9, 0.9)];
        grid.rebuild(&positions);
        let first = grid.all_indices();
        for _ in 0..5 {
            grid.rebuild(&positions);
            assert_eq!(grid.all_indices(), first);
        }
    }

    #[test]
    fn out_of_range_clamps_to_edge_cell_rather_than_dropping() {
        let mut grid = make_grid();
        let positions = vec![Vector2::new(-5.0, -5.0), Vector2::new(50.0, 50.0)];
        grid.rebuild(&positions);
        assert_eq!(grid.all_indices(), vec![0, 1]);
    }

    #[test]
    fn out_of_range_drop_policy_omits_the_particle() {
        let mut grid = SpatialGrid::new(Vector2::new(0.0, 0.0), 1.0, 1.0, 0.1, OutOfRangePolicy::Drop);
        let positions = vec![Vector2::new(0.5, 0.5), Vector2::new(-5.0, -5.0)];
        grid.rebuild(&positions);
        assert_eq!(grid.all_indices(), vec![0]);
    }

    #[test]
    fn query_neighbors_finds_nearby_particle_and_excludes_self() {
        let mut grid = make_grid();
        let positions = vec![Vector2::new(0.5, 0.5), Vector2::new(0.52, 0.5), Vector2::new(0.9, 0.9)];
        grid.rebuild(&positions);
        let mut buf = [usize::MAX; 8];
        let n = grid.query_neighbors(0, &positions, &mut buf);
        assert_eq!(n, 1);
        assert_eq!(buf[0], 1);
    }

    #[test]
    fn query_neighbors_truncates_at_capacity() {
        let mut grid = SpatialGrid::new(Vector2::new(0.0, 0.0), 1.0, 1.0, 1.0, OutOfRangePolicy::ClampToEdge);
        let mut positions = vec![Vector2::new(0.5, 0.5)];
        for k in 0..10 {
            positions.push(Vector2::new(0.5 + 0.001 * k as f32, 0.5));
        }
        grid.rebuild(&positions);
        let mut buf = [usize::MAX; 4];
        let n = grid.query_neighbors(0, &positions, &mut buf);
        assert_eq!(n, 4);
    }

    #[test]
    fn wraparound_generation_resets_tags() {
        let mut grid = make_grid();
        grid.current_generation = u32::MAX;
        let positions = vec![Vector2::new(0.05, 0.05)];
        grid.rebuild(&positions);
        assert_eq!(grid.current_generation, 1);
        assert_eq!(grid.all_indices(), vec![0]);
    }
}
