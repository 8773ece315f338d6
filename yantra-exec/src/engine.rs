//! Supervised concurrent execution of queued trajectories.
//!
//! The executor queues configured execution contexts (a selected controller
//! set plus one trajectory part per controller) and runs them in push order
//! on a single background worker. The worker activates controllers,
//! dispatches the parts, waits on every handle under an expected-duration
//! budget, and aggregates the terminal status. The foreground API stays
//! callable while the worker runs.
//!
//! Locking discipline: `exec` guards the completion flag, the active
//! handles, and the last status; `time_index` guards the expected-timestamp
//! sequence and the current context index, and is only ever taken inside
//! `exec` when both are needed. Stops set the completion flag before
//! cancelling handles so the worker can tell an external stop from its own
//! shutdown.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};

use yantra_plan::JointTrajectory;

use crate::config::ExecConfig;
use crate::error::{ExecError, Result};
use crate::manager::{ControllerHandle, ControllerManager, ExecutionStatus, JointGroups};
use crate::registry::ControllerRegistry;
use crate::selector::select_controllers;
use crate::splitter::split_trajectory;

/// One configured unit of execution: a disjoint controller set and the
/// trajectory part each controller receives.
#[derive(Clone)]
pub struct ExecutionContext {
    pub controllers: Vec<String>,
    pub parts: Vec<JointTrajectory>,
}

/// Invoked with the terminal status once a run finishes.
pub type CompletionCallback = Box<dyn FnOnce(ExecutionStatus) + Send>;

struct ExecState {
    complete: bool,
    active_handles: Vec<Arc<dyn ControllerHandle>>,
    last_status: ExecutionStatus,
}

struct TimeIndex {
    times: Vec<Instant>,
    current_context: Option<usize>,
}

struct Shared {
    manager: Arc<dyn ControllerManager>,
    groups: Option<Arc<dyn JointGroups>>,
    config: ExecConfig,
    registry: Mutex<ControllerRegistry>,
    queue: Mutex<Vec<ExecutionContext>>,
    exec: Mutex<ExecState>,
    complete_cond: Condvar,
    time_index: Mutex<TimeIndex>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

/// Trajectory execution manager.
pub struct TrajectoryExecutor {
    shared: Arc<Shared>,
}

impl TrajectoryExecutor {
    /// Build an executor over the given controller manager.
    ///
    /// `groups` resolves named joint groups for
    /// [`ensure_active_for_group`](Self::ensure_active_for_group) and may be
    /// omitted. The controller inventory is loaded immediately.
    pub fn new(
        manager: Arc<dyn ControllerManager>,
        groups: Option<Arc<dyn JointGroups>>,
        config: ExecConfig,
    ) -> Self {
        let mut registry = ControllerRegistry::new();
        registry.reload(&*manager);
        if config.manage_controllers {
            log::info!("Trajectory execution is managing controllers");
        } else {
            log::info!("Trajectory execution is not managing controllers");
        }
        Self {
            shared: Arc::new(Shared {
                manager,
                groups,
                config,
                registry: Mutex::new(registry),
                queue: Mutex::new(Vec::new()),
                exec: Mutex::new(ExecState {
                    complete: true,
                    active_handles: Vec::new(),
                    last_status: ExecutionStatus::Succeeded,
                }),
                complete_cond: Condvar::new(),
                time_index: Mutex::new(TimeIndex {
                    times: Vec::new(),
                    current_context: None,
                }),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn is_managing_controllers(&self) -> bool {
        self.shared.config.manage_controllers
    }

    /// Configure a trajectory (select controllers, split it) and append the
    /// resulting context to the queue.
    ///
    /// Empty `controllers` means "choose among everything known"; the
    /// inventory is reloaded once if selection fails, in case it was stale.
    /// Fails while another execution is in flight.
    pub fn push(&self, trajectory: JointTrajectory, controllers: &[String]) -> Result<()> {
        if !self.shared.exec.lock().complete {
            log::error!("Cannot push a new trajectory while another is being executed");
            return Err(ExecError::ExecutionInProgress);
        }
        let context = self.shared.configure(trajectory, controllers)?;
        if self.shared.config.verbose {
            log::info!(
                "Pushed trajectory for execution using controllers {:?}",
                context.controllers
            );
        }
        self.shared.queue.lock().push(context);
        Ok(())
    }

    /// `push` with at most one controller hint.
    pub fn push_with_controller(&self, trajectory: JointTrajectory, controller: &str) -> Result<()> {
        if controller.is_empty() {
            self.push(trajectory, &[])
        } else {
            self.push(trajectory, &[controller.to_string()])
        }
    }

    /// Start executing the queued contexts on a background worker.
    ///
    /// Any previously finished worker is joined first. The callback runs on
    /// the worker with the terminal status; `auto_clear` empties the queue
    /// once the run ends.
    pub fn execute(&self, callback: Option<CompletionCallback>, auto_clear: bool) {
        self.shared.stop_execution(false);
        self.shared.exec.lock().complete = false;
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || run_worker(shared, callback, auto_clear));
        *self.shared.worker.lock() = Some(handle);
    }

    /// Execute the queue and block until it reaches a terminal status.
    pub fn execute_and_wait(&self, auto_clear: bool) -> ExecutionStatus {
        self.execute(None, auto_clear);
        self.wait_for_execution()
    }

    /// Block until the current run (if any) reaches a terminal status.
    pub fn wait_for_execution(&self) -> ExecutionStatus {
        {
            let mut exec = self.shared.exec.lock();
            while !exec.complete {
                self.shared.complete_cond.wait(&mut exec);
            }
        }
        // the worker has finished; reap it
        self.shared.stop_execution(false);
        self.shared.exec.lock().last_status
    }

    /// Preempt the current run.
    ///
    /// Idempotent and safe from any thread. Cancels every active handle and
    /// records PREEMPTED unless the worker already recorded a budget
    /// overrun. A no-op while idle.
    pub fn stop_execution(&self, auto_clear: bool) {
        self.shared.stop_execution(auto_clear);
    }

    /// Drop all queued contexts.
    pub fn clear(&self) {
        self.shared.queue.lock().clear();
    }

    /// Number of contexts currently queued.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn last_execution_status(&self) -> ExecutionStatus {
        self.shared.exec.lock().last_status
    }

    /// Where execution is expected to be right now, as
    /// `(context index, waypoint index)`.
    ///
    /// The waypoint index is `None` while no time index is in place (for
    /// example between activation and dispatch); the whole result is `None`
    /// while no context is running.
    pub fn current_expected_index(&self) -> Option<(usize, Option<usize>)> {
        let ti = self.shared.time_index.lock();
        let context = ti.current_context?;
        if ti.times.is_empty() {
            return Some((context, None));
        }
        let now = Instant::now();
        Some((context, Some(ti.times.partition_point(|&t| t < now))))
    }

    /// Make sure exactly the named controllers (plus whatever else must
    /// stay up to keep their joints covered) are active.
    pub fn ensure_active_controllers(&self, controllers: &[String]) -> Result<()> {
        self.shared.ensure_active(controllers)
    }

    pub fn ensure_active_controller(&self, controller: &str) -> Result<()> {
        self.shared.ensure_active(&[controller.to_string()])
    }

    /// Select and activate controllers covering the given joints.
    pub fn ensure_active_for_joints(&self, joints: &[String]) -> Result<()> {
        let selected = {
            let mut registry = self.shared.registry.lock();
            registry.update_all(self.shared.config.state_cache_age(), &*self.shared.manager);
            let actuated: BTreeSet<String> = joints.iter().cloned().collect();
            let available = registry.names();
            select_controllers(
                &registry,
                &actuated,
                &available,
                self.shared.config.manage_controllers,
            )
            .ok_or(ExecError::NoCoveringCombination)?
        };
        self.shared.ensure_active(&selected)
    }

    /// Select and activate controllers covering a named joint group.
    pub fn ensure_active_for_group(&self, group: &str) -> Result<()> {
        let groups = self
            .shared
            .groups
            .as_ref()
            .ok_or_else(|| ExecError::UnknownGroup(group.to_string()))?;
        let joints = groups
            .group_joints(group)
            .ok_or_else(|| ExecError::UnknownGroup(group.to_string()))?;
        self.ensure_active_for_joints(&joints)
    }

    /// React to an external string event. `stop` preempts and clears;
    /// anything else is logged and ignored.
    pub fn process_event(&self, event: &str) {
        self.shared.process_event(event);
    }

    /// Spawn a listener draining string events from a channel until the
    /// sender side disconnects.
    pub fn attach_event_channel(&self, events: Receiver<String>) -> thread::JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            while let Ok(event) = events.recv() {
                log::info!("Received event '{}'", event);
                shared.process_event(&event);
            }
        })
    }
}

impl Drop for TrajectoryExecutor {
    fn drop(&mut self) {
        self.shared.stop_execution(false);
    }
}

impl Shared {
    fn process_event(&self, event: &str) {
        if event == "stop" {
            self.stop_execution(true);
        } else {
            log::warn!("Unknown event type: '{}'", event);
        }
    }

    /// Mark the run complete and cancel everything in flight. Returns
    /// whether there was a run to stop.
    ///
    /// The completion flag is set before any cancellation so the worker
    /// observes the external stop and leaves the PREEMPTED status alone.
    fn halt(&self) -> bool {
        let mut exec = self.exec.lock();
        if exec.complete {
            return false;
        }
        exec.complete = true;
        for handle in &exec.active_handles {
            handle.cancel_execution();
        }
        exec.last_status = ExecutionStatus::Preempted;
        true
    }

    fn stop_execution(&self, auto_clear: bool) {
        let acted = self.halt();
        if acted {
            log::info!("Stopped trajectory execution");
        }
        self.join_worker();
        if acted && auto_clear {
            self.queue.lock().clear();
        }
    }

    fn join_worker(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // the worker itself may land here via an event callback; it
            // must not join itself
            if handle.thread().id() == thread::current().id() {
                *self.worker.lock() = Some(handle);
                return;
            }
            let _ = handle.join();
        }
    }

    fn configure(
        &self,
        trajectory: JointTrajectory,
        controllers: &[String],
    ) -> Result<ExecutionContext> {
        if trajectory.is_empty() {
            log::warn!("The trajectory to execute is empty");
            return Err(ExecError::EmptyTrajectory);
        }
        let actuated = trajectory.actuated_joints();
        if actuated.is_empty() {
            log::warn!("The trajectory to execute names no joints");
            return Err(ExecError::NoActuatedJoints);
        }

        let mut registry = self.registry.lock();
        if controllers.is_empty() {
            for attempt in 0..2 {
                if attempt == 1 {
                    // selection may have failed on a stale inventory
                    registry.reload(&*self.manager);
                }
                registry.update_all(self.config.state_cache_age(), &*self.manager);
                let available = registry.names();
                if let Some(selected) = select_controllers(
                    &registry,
                    &actuated,
                    &available,
                    self.config.manage_controllers,
                ) {
                    let parts = split_trajectory(&trajectory, &selected, &registry)?;
                    return Ok(ExecutionContext {
                        controllers: selected,
                        parts,
                    });
                }
            }
            Err(ExecError::NoCoveringCombination)
        } else {
            if controllers.iter().any(|c| !registry.contains(c)) {
                registry.reload(&*self.manager);
                if let Some(missing) = controllers.iter().find(|c| !registry.contains(c)) {
                    log::error!("Controller '{}' is not known", missing);
                    return Err(ExecError::UnknownController(missing.clone()));
                }
            }
            registry.update_all(self.config.state_cache_age(), &*self.manager);
            let selected = select_controllers(
                &registry,
                &actuated,
                controllers,
                self.config.manage_controllers,
            )
            .ok_or(ExecError::NoCoveringCombination)?;
            let parts = split_trajectory(&trajectory, &selected, &registry)?;
            Ok(ExecutionContext {
                controllers: selected,
                parts,
            })
        }
    }

    /// Activate the named controllers, deactivating overlapping ones and
    /// covering any joints that would be orphaned by the switch.
    fn ensure_active(&self, controllers: &[String]) -> Result<()> {
        let mut registry = self.registry.lock();
        registry.update_all(self.config.state_cache_age(), &*self.manager);

        if !self.config.manage_controllers {
            for name in controllers {
                let Some(info) = registry.get(name) else {
                    return Err(ExecError::UnknownController(name.clone()));
                };
                if !info.state.active {
                    return Err(ExecError::ControllerNotActive(name.clone()));
                }
            }
            return Ok(());
        }

        let mut to_activate: Vec<String> = Vec::new();
        let mut to_deactivate: Vec<String> = Vec::new();
        let mut joints_on: BTreeSet<String> = BTreeSet::new();
        let mut joints_off: BTreeSet<String> = BTreeSet::new();
        for name in controllers {
            let Some(info) = registry.get(name) else {
                log::error!("Controller '{}' is not known", name);
                return Err(ExecError::UnknownController(name.clone()));
            };
            if info.state.active {
                log::debug!("Controller '{}' is already active", name);
                continue;
            }
            log::debug!("Need to activate '{}'", name);
            joints_on.extend(info.joints.iter().cloned());
            let overlapping: Vec<String> = info.overlapping.iter().cloned().collect();
            to_activate.push(name.clone());
            for other in overlapping {
                let Some(other_info) = registry.get(&other) else {
                    continue;
                };
                if other_info.state.active && !to_deactivate.contains(&other) {
                    joints_off.extend(other_info.joints.iter().cloned());
                    to_deactivate.push(other);
                }
            }
        }

        // deactivation must not orphan joints the switch does not re-cover
        let gap: BTreeSet<String> = joints_off.difference(&joints_on).cloned().collect();
        if !gap.is_empty() {
            let candidates: Vec<String> = registry
                .iter()
                .filter(|info| to_activate.iter().all(|a| !info.overlapping.contains(a)))
                .map(|info| info.name.clone())
                .collect();
            let extra = select_controllers(&registry, &gap, &candidates, true)
                .ok_or(ExecError::NoCoveringCombination)?;
            to_activate.extend(extra);
        }

        if to_activate.is_empty() && to_deactivate.is_empty() {
            return Ok(());
        }

        for name in &to_activate {
            let loaded = registry.get(name).is_some_and(|info| info.state.loaded);
            registry.invalidate(name);
            if !loaded && !self.manager.load_controller(name) {
                return Err(ExecError::LoadFailed(name.clone()));
            }
        }
        for name in &to_deactivate {
            registry.invalidate(name);
        }
        if self.manager.switch_controllers(&to_activate, &to_deactivate) {
            Ok(())
        } else {
            Err(ExecError::SwitchFailed)
        }
    }
}

fn run_worker(shared: Arc<Shared>, callback: Option<CompletionCallback>, auto_clear: bool) {
    {
        let mut exec = shared.exec.lock();
        // a stop arrived before anything was started
        if exec.complete {
            exec.last_status = ExecutionStatus::Aborted;
            return;
        }
        exec.last_status = ExecutionStatus::Succeeded;
    }
    log::debug!("Starting trajectory execution");

    let count = shared.queue.lock().len();
    for index in 0..count {
        let proceed = execute_context(&shared, index);
        if !proceed || shared.exec.lock().complete {
            break;
        }
    }

    if auto_clear {
        shared.queue.lock().clear();
    }

    let status = {
        let mut exec = shared.exec.lock();
        exec.complete = true;
        exec.last_status
    };
    shared.complete_cond.notify_all();
    log::debug!("Completed trajectory execution with status {}", status);
    if let Some(callback) = callback {
        callback(status);
    }
}

/// Run one queued context to completion. Returns whether the worker should
/// continue with the next one.
fn execute_context(shared: &Shared, index: usize) -> bool {
    let Some(context) = shared.queue.lock().get(index).cloned() else {
        return false;
    };

    if let Err(e) = shared.ensure_active(&context.controllers) {
        log::error!("Failed to activate controllers for execution: {}", e);
        shared.exec.lock().last_status = ExecutionStatus::Aborted;
        return false;
    }
    if shared.exec.lock().complete {
        return false;
    }

    let handles: Vec<Arc<dyn ControllerHandle>>;
    {
        let mut exec = shared.exec.lock();
        if exec.complete {
            return false;
        }
        shared.time_index.lock().current_context = Some(index);

        exec.active_handles.clear();
        for name in &context.controllers {
            match shared.manager.controller_handle(name) {
                Some(handle) => exec.active_handles.push(handle),
                None => {
                    log::error!("No handle available for controller '{}'", name);
                    exec.active_handles.clear();
                    shared.time_index.lock().current_context = None;
                    exec.last_status = ExecutionStatus::Aborted;
                    return false;
                }
            }
        }

        for (i, part) in context.parts.iter().enumerate() {
            if let Err(e) = exec.active_handles[i].send_trajectory(part) {
                log::error!(
                    "Failed to send trajectory part {} of {} to controller '{}': {}",
                    i + 1,
                    context.parts.len(),
                    context.controllers[i],
                    e
                );
                if i > 0 {
                    log::error!("Cancelling previously sent trajectory parts");
                }
                for j in 0..i {
                    exec.active_handles[j].cancel_execution();
                }
                exec.active_handles.clear();
                shared.time_index.lock().current_context = None;
                exec.last_status = ExecutionStatus::Aborted;
                return false;
            }
        }
        handles = exec.active_handles.clone();
    }

    // per-context budget: the slowest part, scaled and padded
    let dispatch_time = Instant::now();
    let mut expected = Duration::ZERO;
    let mut longest: Option<usize> = None;
    for (i, part) in context.parts.iter().enumerate() {
        if part.points.is_empty() {
            continue;
        }
        let d = start_offset(part, dispatch_time) + part.total_duration();
        expected = expected.max(d);
        if longest.is_none_or(|l| part.points.len() > context.parts[l].points.len()) {
            longest = Some(i);
        }
    }
    let expected = expected.mul_f64(shared.config.timeout_scale) + shared.config.timeout_pad();

    // absolute expected timestamps over the densest part, for observers
    if let Some(l) = longest {
        let part = &context.parts[l];
        let offset = start_offset(part, dispatch_time);
        let mut ti = shared.time_index.lock();
        ti.times = part
            .points
            .iter()
            .map(|p| dispatch_time + offset + p.time_from_start)
            .collect();
    }

    let mut result = true;
    for handle in &handles {
        if !handle.wait_for_execution(expected) {
            let complete = shared.exec.lock().complete;
            if !complete && dispatch_time.elapsed() > expected {
                log::error!(
                    "Controller '{}' is taking too long to execute (expected upper bound {:?}), stopping trajectory",
                    handle.name(),
                    expected
                );
                shared.halt();
                // the budget overrun wins over the PREEMPTED set by halt
                shared.exec.lock().last_status = ExecutionStatus::TimedOut;
            }
        }
        if shared.exec.lock().complete {
            result = false;
            break;
        }
        let status = handle.last_execution_status();
        if status != ExecutionStatus::Succeeded {
            log::warn!("Controller '{}' reports status {}", handle.name(), status);
            shared.exec.lock().last_status = status;
            result = false;
        }
    }

    {
        let mut exec = shared.exec.lock();
        exec.active_handles.clear();
        let mut ti = shared.time_index.lock();
        ti.times.clear();
        ti.current_context = None;
    }
    result
}

fn start_offset(part: &JointTrajectory, now: Instant) -> Duration {
    match part.start_time {
        Some(stamp) if stamp > now => stamp - now,
        _ => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ControllerState;

    struct EmptyManager;

    impl ControllerManager for EmptyManager {
        fn controller_names(&self) -> Vec<String> {
            Vec::new()
        }

        fn controller_joints(&self, _name: &str) -> Vec<String> {
            Vec::new()
        }

        fn controller_state(&self, _name: &str) -> ControllerState {
            ControllerState::default()
        }

        fn load_controller(&self, _name: &str) -> bool {
            false
        }

        fn switch_controllers(&self, _activate: &[String], _deactivate: &[String]) -> bool {
            false
        }

        fn controller_handle(&self, _name: &str) -> Option<Arc<dyn ControllerHandle>> {
            None
        }
    }

    #[test]
    fn test_stop_while_idle_is_a_noop() {
        let executor =
            TrajectoryExecutor::new(Arc::new(EmptyManager), None, ExecConfig::default());
        executor.stop_execution(false);
        executor.stop_execution(true);
        assert_eq!(executor.last_execution_status(), ExecutionStatus::Succeeded);
        assert!(executor.current_expected_index().is_none());
    }

    #[test]
    fn test_push_empty_trajectory_is_rejected() {
        let executor =
            TrajectoryExecutor::new(Arc::new(EmptyManager), None, ExecConfig::default());
        let err = executor.push(JointTrajectory::default(), &[]).unwrap_err();
        assert!(matches!(err, ExecError::EmptyTrajectory));
    }

    #[test]
    fn test_no_controllers_means_no_covering_combination() {
        let executor =
            TrajectoryExecutor::new(Arc::new(EmptyManager), None, ExecConfig::default());
        let trajectory = JointTrajectory {
            joint_names: vec!["j1".into()],
            start_time: None,
            points: vec![yantra_plan::TrajectoryPoint {
                positions: vec![0.0],
                ..Default::default()
            }],
        };
        let err = executor.push(trajectory, &[]).unwrap_err();
        assert!(matches!(err, ExecError::NoCoveringCombination));
    }

    #[test]
    fn test_unknown_group() {
        let executor =
            TrajectoryExecutor::new(Arc::new(EmptyManager), None, ExecConfig::default());
        let err = executor.ensure_active_for_group("arm").unwrap_err();
        assert!(matches!(err, ExecError::UnknownGroup(_)));
    }
}
