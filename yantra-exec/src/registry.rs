//! Known controllers, their joint sets, and the overlap relation.
//!
//! The registry caches what the controller manager reports: which
//! controllers exist, which joints each actuates, and their lifecycle
//! state. The overlap relation (two controllers sharing at least one
//! joint) is rebuilt on every reload; state queries go through a small
//! time-based cache so selection does not hammer the manager.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::manager::{ControllerManager, ControllerState};

/// Everything the registry knows about one controller.
#[derive(Clone, Debug)]
pub struct ControllerInfo {
    pub name: String,
    pub joints: BTreeSet<String>,
    /// Controllers sharing at least one joint with this one (never itself).
    pub overlapping: BTreeSet<String>,
    pub state: ControllerState,
    /// When `state` was last refreshed from the manager.
    pub last_update: Option<Instant>,
}

/// Ordered map of controller name to cached information.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: BTreeMap<String, ControllerInfo>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refetch the controller list and joint sets, and rebuild the overlap
    /// relation.
    ///
    /// Quadratic in the number of controllers, which stays in the tens on
    /// any realistic host.
    pub fn reload(&mut self, manager: &dyn ControllerManager) {
        self.controllers.clear();
        for name in manager.controller_names() {
            let joints: BTreeSet<String> = manager.controller_joints(&name).into_iter().collect();
            self.controllers.insert(
                name.clone(),
                ControllerInfo {
                    name,
                    joints,
                    overlapping: BTreeSet::new(),
                    state: ControllerState::default(),
                    last_update: None,
                },
            );
        }

        let names: Vec<String> = self.controllers.keys().cloned().collect();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                let disjoint = self.controllers[&names[i]]
                    .joints
                    .is_disjoint(&self.controllers[&names[j]].joints);
                if !disjoint {
                    if let Some(c) = self.controllers.get_mut(&names[i]) {
                        c.overlapping.insert(names[j].clone());
                    }
                    if let Some(c) = self.controllers.get_mut(&names[j]) {
                        c.overlapping.insert(names[i].clone());
                    }
                }
            }
        }
        log::debug!("Reloaded {} controllers", self.controllers.len());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ControllerInfo> {
        self.controllers.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.controllers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerInfo> {
        self.controllers.values()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Refresh one controller's lifecycle state if the cached copy is older
    /// than `age`.
    pub fn update_state(&mut self, name: &str, age: Duration, manager: &dyn ControllerManager) {
        let Some(info) = self.controllers.get_mut(name) else {
            log::error!("Controller '{}' is not known", name);
            return;
        };
        let stale = match info.last_update {
            None => true,
            Some(at) => at.elapsed() >= age,
        };
        if stale {
            info.state = manager.controller_state(name);
            info.last_update = Some(Instant::now());
        }
    }

    /// Refresh every controller's lifecycle state with the same cache age.
    pub fn update_all(&mut self, age: Duration, manager: &dyn ControllerManager) {
        let names: Vec<String> = self.controllers.keys().cloned().collect();
        for name in names {
            self.update_state(&name, age, manager);
        }
    }

    /// Drop the cached state stamp so the next query refreshes.
    pub fn invalidate(&mut self, name: &str) {
        if let Some(info) = self.controllers.get_mut(name) {
            info.last_update = None;
        }
    }
}
