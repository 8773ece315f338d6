//! 3D breadth-first wavefront over a boolean wall grid.
//!
//! Propagates hop counts outward from a seed voxel through 6-connected
//! free space. Used by the planning environment as a workspace heuristic:
//! seeded at the goal voxel, every cell then knows its minimum number of
//! collision-free hops to the goal.

use std::collections::VecDeque;

const UNVISITED: u32 = u32::MAX;

/// 6-connected wavefront grid.
///
/// Cells on the outer 1-voxel rim are implicit walls; the seed and all
/// queries are expected to use interior coordinates. Out-of-range queries
/// return the sentinel rather than panicking.
pub struct Bfs3d {
    dim_x: usize,
    dim_y: usize,
    dim_z: usize,
    walls: Vec<bool>,
    dist: Vec<u32>,
    wall_count: usize,
}

impl Bfs3d {
    /// Create a grid of the given dimensions with no walls and no distances.
    pub fn new(dim_x: usize, dim_y: usize, dim_z: usize) -> Self {
        let cells = dim_x * dim_y * dim_z;
        Self {
            dim_x,
            dim_y,
            dim_z,
            walls: vec![false; cells],
            dist: vec![UNVISITED; cells],
            wall_count: 0,
        }
    }

    /// Sentinel returned for unreachable or out-of-range cells.
    ///
    /// Strictly larger than any reachable hop count.
    #[inline]
    pub fn sentinel(&self) -> u32 {
        (self.dim_x * self.dim_y * self.dim_z) as u32
    }

    #[inline]
    fn index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let (x, y, z) = (x as usize, y as usize, z as usize);
        if x >= self.dim_x || y >= self.dim_y || z >= self.dim_z {
            return None;
        }
        Some((z * self.dim_y + y) * self.dim_x + x)
    }

    /// The rim is treated as solid regardless of wall flags.
    #[inline]
    fn on_rim(&self, x: i32, y: i32, z: i32) -> bool {
        x <= 0
            || y <= 0
            || z <= 0
            || x as usize >= self.dim_x - 1
            || y as usize >= self.dim_y - 1
            || z as usize >= self.dim_z - 1
    }

    /// Mark a cell as impassable. Out-of-range coordinates are ignored.
    pub fn set_wall(&mut self, x: i32, y: i32, z: i32) {
        if let Some(idx) = self.index(x, y, z) {
            if !self.walls[idx] {
                self.walls[idx] = true;
                self.wall_count += 1;
            }
        }
    }

    /// Whether a cell is marked as a wall. Out-of-range reads as `true`.
    pub fn is_wall(&self, x: i32, y: i32, z: i32) -> bool {
        match self.index(x, y, z) {
            Some(idx) => self.walls[idx],
            None => true,
        }
    }

    /// Number of cells explicitly marked as walls.
    pub fn wall_count(&self) -> usize {
        self.wall_count
    }

    /// Propagate hop counts outward from the seed cell.
    ///
    /// Standard FIFO wavefront: seed distance 0, visit each free cell once,
    /// skip walls. Any previous run is discarded. A seed on a wall or on
    /// the rim leaves every cell unreachable.
    pub fn run(&mut self, seed_x: i32, seed_y: i32, seed_z: i32) {
        self.dist.fill(UNVISITED);

        let Some(seed_idx) = self.index(seed_x, seed_y, seed_z) else {
            return;
        };
        if self.walls[seed_idx] || self.on_rim(seed_x, seed_y, seed_z) {
            return;
        }

        let mut queue = VecDeque::new();
        self.dist[seed_idx] = 0;
        queue.push_back((seed_x, seed_y, seed_z, 0u32));

        const NEIGHBORS: [(i32, i32, i32); 6] = [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ];

        while let Some((x, y, z, here)) = queue.pop_front() {
            for (dx, dy, dz) in NEIGHBORS {
                let (nx, ny, nz) = (x + dx, y + dy, z + dz);
                if self.on_rim(nx, ny, nz) {
                    continue;
                }
                let Some(nidx) = self.index(nx, ny, nz) else {
                    continue;
                };
                if self.walls[nidx] || self.dist[nidx] != UNVISITED {
                    continue;
                }
                self.dist[nidx] = here + 1;
                queue.push_back((nx, ny, nz, here + 1));
            }
        }
    }

    /// Hop count from the last seed, or the sentinel if the cell is
    /// unreachable, a wall, or out of range.
    pub fn distance(&self, x: i32, y: i32, z: i32) -> u32 {
        match self.index(x, y, z) {
            Some(idx) if self.dist[idx] != UNVISITED => self.dist[idx],
            _ => self.sentinel(),
        }
    }
}
