//! Hash-consed registry of expanded states.
//!
//! States are keyed by their discretised coordinate alone; the continuous
//! angles, end-effector voxel, and producing action ride along as payload.
//! IDs are assigned at insertion order and never reused, so `entries[id].id
//! == id` for every entry.

use std::collections::HashMap;

/// One expanded configuration.
#[derive(Clone, Debug)]
pub struct StateEntry {
    /// Stable, monotonically assigned identifier.
    pub id: usize,
    /// Discretised joint coordinate (the hash key).
    pub coord: Vec<i32>,
    /// Continuous joint angles matching `coord`.
    pub angles: Vec<f64>,
    /// End-effector voxel in the distance field.
    pub xyz: [i32; 3],
    /// Index of the action primitive that produced this entry (0 for seeds).
    pub producing_action: usize,
}

/// Registry mapping discretised coordinates to state entries.
#[derive(Default)]
pub struct StateTable {
    entries: Vec<StateEntry>,
    by_coord: HashMap<Vec<i32>, usize>,
    start_id: Option<usize>,
    goal_id: Option<usize>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry and return its ID.
    ///
    /// The coordinate must not already be present; a table never holds two
    /// entries with equal coordinates.
    pub fn add_entry(
        &mut self,
        coord: Vec<i32>,
        angles: Vec<f64>,
        xyz: [i32; 3],
        producing_action: usize,
    ) -> usize {
        debug_assert!(!self.by_coord.contains_key(&coord));
        let id = self.entries.len();
        self.by_coord.insert(coord.clone(), id);
        self.entries.push(StateEntry {
            id,
            coord,
            angles,
            xyz,
            producing_action,
        });
        id
    }

    /// Look up the entry for a coordinate, if it was ever inserted.
    pub fn lookup(&self, coord: &[i32]) -> Option<&StateEntry> {
        self.by_coord.get(coord).map(|&id| &self.entries[id])
    }

    /// Entry by ID, or `None` for an ID never handed out.
    pub fn entry(&self, id: usize) -> Option<&StateEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_start(&mut self, id: usize) {
        self.start_id = Some(id);
    }

    pub fn set_goal(&mut self, id: usize) {
        self.goal_id = Some(id);
    }

    pub fn start_id(&self) -> Option<usize> {
        self.start_id
    }

    pub fn goal_id(&self) -> Option<usize> {
        self.goal_id
    }

    /// Materialise the angle arrays for a sequence of state IDs, in order.
    ///
    /// Returns `None` if any ID is unknown.
    pub fn angle_sequence(&self, ids: &[usize]) -> Option<Vec<Vec<f64>>> {
        ids.iter()
            .map(|&id| self.entry(id).map(|e| e.angles.clone()))
            .collect()
    }
}
