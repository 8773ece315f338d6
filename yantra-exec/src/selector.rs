//! Minimum-cardinality covering selection over the controller registry.
//!
//! Given the joints a trajectory actuates, find the smallest set of
//! pairwise non-overlapping controllers whose joints cover them. Ties at
//! the winning size are broken by a strict lexicographic ranking; hosts
//! that cannot load/unload controllers additionally prefer combinations
//! that are already running.
//!
//! The enumeration is exponential in principle but bounded in practice by
//! the small controller counts of real hosts and by the disjointness prune;
//! no memoisation is attempted.

use std::collections::BTreeSet;

use crate::registry::ControllerRegistry;

/// Select the smallest covering combination of non-overlapping controllers.
///
/// `available` restricts the search; pass every registry name for an
/// unconstrained selection. Controller states are read as cached, so
/// refresh the registry first when ranking freshness matters. Returns
/// `None` when no combination of any size covers `actuated_joints`.
pub fn select_controllers(
    registry: &ControllerRegistry,
    actuated_joints: &BTreeSet<String>,
    available: &[String],
    manage_controllers: bool,
) -> Option<Vec<String>> {
    for count in 1..=available.len() {
        let Some(selected) =
            find_combination(registry, actuated_joints, count, available, manage_controllers)
        else {
            continue;
        };
        // a host that cannot switch controllers would rather run a larger
        // combination that is already active than the minimal cold one
        if !manage_controllers && !are_controllers_active(registry, &selected) {
            for larger in (count + 1)..=available.len() {
                if let Some(option) = find_combination(
                    registry,
                    actuated_joints,
                    larger,
                    available,
                    manage_controllers,
                ) {
                    if are_controllers_active(registry, &option) {
                        return Some(option);
                    }
                }
            }
        }
        return Some(selected);
    }
    None
}

/// Whether every named controller currently reports as active.
pub fn are_controllers_active(registry: &ControllerRegistry, controllers: &[String]) -> bool {
    controllers
        .iter()
        .all(|name| registry.get(name).is_some_and(|info| info.state.active))
}

/// Best combination of exactly `count` controllers, or `None`.
///
/// Non-managing hosts take the first combination in rank order that is
/// already fully active, falling back to the ranked winner when none is.
fn find_combination(
    registry: &ControllerRegistry,
    actuated_joints: &BTreeSet<String>,
    count: usize,
    available: &[String],
    manage_controllers: bool,
) -> Option<Vec<String>> {
    let mut options: Vec<Vec<String>> = Vec::new();
    let mut work = Vec::with_capacity(count);
    generate_combinations(
        registry,
        actuated_joints,
        0,
        count,
        available,
        &mut work,
        &mut options,
    );
    log::debug!(
        "Looking for {} controllers covering {} joints: {} options",
        count,
        actuated_joints.len(),
        options.len()
    );
    if options.is_empty() {
        return None;
    }
    if options.len() == 1 {
        return options.pop();
    }

    // rank: more defaults, then tighter joint coverage, then fewer already
    // active (cold combinations preferred when switching is allowed)
    let rank = |option: &Vec<String>| -> (usize, usize, usize) {
        let mut defaults = 0usize;
        let mut joints = 0usize;
        let mut active = 0usize;
        for name in option {
            if let Some(info) = registry.get(name) {
                if info.state.default_controller {
                    defaults += 1;
                }
                if info.state.active {
                    active += 1;
                }
                joints += info.joints.len();
            }
        }
        (defaults, joints, active)
    };

    options.sort_by(|a, b| {
        let (da, ja, aa) = rank(a);
        let (db, jb, ab) = rank(b);
        db.cmp(&da).then(ja.cmp(&jb)).then(aa.cmp(&ab))
    });

    if !manage_controllers {
        if let Some(pos) = options
            .iter()
            .position(|option| are_controllers_active(registry, option))
        {
            return Some(options.swap_remove(pos));
        }
    }

    Some(options.remove(0))
}

/// Depth-first enumeration of `count`-subsets of `available` that are
/// pairwise non-overlapping; covering subsets land in `options`.
#[allow(clippy::too_many_arguments)]
fn generate_combinations(
    registry: &ControllerRegistry,
    actuated_joints: &BTreeSet<String>,
    start_index: usize,
    count: usize,
    available: &[String],
    selected: &mut Vec<String>,
    options: &mut Vec<Vec<String>>,
) {
    if selected.len() == count {
        if covers(registry, selected, actuated_joints) {
            options.push(selected.clone());
        }
        return;
    }
    for i in start_index..available.len() {
        let Some(info) = registry.get(&available[i]) else {
            continue;
        };
        if selected.iter().any(|name| info.overlapping.contains(name)) {
            continue;
        }
        selected.push(available[i].clone());
        generate_combinations(
            registry,
            actuated_joints,
            i + 1,
            count,
            available,
            selected,
            options,
        );
        selected.pop();
    }
}

/// Whether the union of the selected controllers' joints is a superset of
/// the actuated joints.
fn covers(registry: &ControllerRegistry, selected: &[String], actuated_joints: &BTreeSet<String>) -> bool {
    let mut combined: BTreeSet<&String> = BTreeSet::new();
    for name in selected {
        if let Some(info) = registry.get(name) {
            combined.extend(info.joints.iter());
        }
    }
    actuated_joints.iter().all(|j| combined.contains(j))
}
