//! End-to-end execution tests over a scripted controller manager.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use yantra_exec::{
    ControllerHandle, ControllerManager, ControllerState, ExecConfig, ExecError, ExecutionStatus,
    TrajectoryExecutor,
};
use yantra_plan::{JointTrajectory, TrajectoryPoint};

/// How a scripted handle behaves once a part is sent to it.
#[derive(Clone, Copy)]
enum HandleScript {
    /// Complete successfully after the given wall time.
    Finish(Duration),
    /// Complete after the given wall time, then report this status.
    FinishWith(Duration, ExecutionStatus),
    /// Never complete on its own; only cancellation ends it.
    NeverFinish,
    /// Refuse the part outright.
    RejectSend,
}

struct ScriptedHandle {
    name: String,
    script: HandleScript,
    sent: Mutex<Vec<JointTrajectory>>,
    cancelled: AtomicBool,
}

impl ScriptedHandle {
    fn new(name: &str, script: HandleScript) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script,
            sent: Mutex::new(Vec::new()),
            cancelled: AtomicBool::new(false),
        })
    }

    fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn sent_parts(&self) -> Vec<JointTrajectory> {
        self.sent.lock().clone()
    }
}

impl ControllerHandle for ScriptedHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_trajectory(&self, part: &JointTrajectory) -> yantra_exec::Result<()> {
        if matches!(self.script, HandleScript::RejectSend) {
            return Err(ExecError::SendFailed(self.name.clone()));
        }
        self.sent.lock().push(part.clone());
        Ok(())
    }

    fn cancel_execution(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn wait_for_execution(&self, timeout: Duration) -> bool {
        let run_time = match self.script {
            HandleScript::Finish(d) | HandleScript::FinishWith(d, _) => Some(d),
            HandleScript::NeverFinish => None,
            HandleScript::RejectSend => Some(Duration::ZERO),
        };
        let started = Instant::now();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            if let Some(run_time) = run_time {
                if started.elapsed() >= run_time {
                    return true;
                }
            }
            if started.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn last_execution_status(&self) -> ExecutionStatus {
        if self.cancelled.load(Ordering::SeqCst) {
            return ExecutionStatus::Preempted;
        }
        match self.script {
            HandleScript::FinishWith(_, status) => status,
            _ => ExecutionStatus::Succeeded,
        }
    }
}

struct ScriptedController {
    joints: Vec<String>,
    state: ControllerState,
    handle: Arc<ScriptedHandle>,
}

#[derive(Default)]
struct ScriptedManager {
    controllers: Mutex<BTreeMap<String, ScriptedController>>,
    loads: Mutex<Vec<String>>,
    switches: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl ScriptedManager {
    fn with(
        self,
        name: &str,
        joints: &[&str],
        state: ControllerState,
        script: HandleScript,
    ) -> Self {
        self.controllers.lock().insert(
            name.to_string(),
            ScriptedController {
                joints: joints.iter().map(|j| j.to_string()).collect(),
                state,
                handle: ScriptedHandle::new(name, script),
            },
        );
        self
    }

    fn handle_for(&self, name: &str) -> Arc<ScriptedHandle> {
        Arc::clone(&self.controllers.lock()[name].handle)
    }

    fn switch_log(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.switches.lock().clone()
    }
}

impl ControllerManager for ScriptedManager {
    fn controller_names(&self) -> Vec<String> {
        self.controllers.lock().keys().cloned().collect()
    }

    fn controller_joints(&self, name: &str) -> Vec<String> {
        self.controllers
            .lock()
            .get(name)
            .map(|c| c.joints.clone())
            .unwrap_or_default()
    }

    fn controller_state(&self, name: &str) -> ControllerState {
        self.controllers
            .lock()
            .get(name)
            .map(|c| c.state)
            .unwrap_or_default()
    }

    fn load_controller(&self, name: &str) -> bool {
        self.loads.lock().push(name.to_string());
        if let Some(c) = self.controllers.lock().get_mut(name) {
            c.state.loaded = true;
        }
        true
    }

    fn switch_controllers(&self, activate: &[String], deactivate: &[String]) -> bool {
        self.switches
            .lock()
            .push((activate.to_vec(), deactivate.to_vec()));
        let mut controllers = self.controllers.lock();
        for name in activate {
            if let Some(c) = controllers.get_mut(name) {
                c.state.active = true;
            }
        }
        for name in deactivate {
            if let Some(c) = controllers.get_mut(name) {
                c.state.active = false;
            }
        }
        true
    }

    fn controller_handle(&self, name: &str) -> Option<Arc<dyn ControllerHandle>> {
        self.controllers
            .lock()
            .get(name)
            .map(|c| Arc::clone(&c.handle) as Arc<dyn ControllerHandle>)
    }
}

const ACTIVE_DEFAULT: ControllerState = ControllerState {
    loaded: true,
    active: true,
    default_controller: true,
};

const INACTIVE: ControllerState = ControllerState {
    loaded: true,
    active: false,
    default_controller: false,
};

fn trajectory(joints: &[&str], times_ms: &[u64]) -> JointTrajectory {
    JointTrajectory {
        joint_names: joints.iter().map(|j| j.to_string()).collect(),
        start_time: None,
        points: times_ms
            .iter()
            .map(|&t| TrajectoryPoint {
                time_from_start: Duration::from_millis(t),
                positions: vec![0.0; joints.len()],
                ..Default::default()
            })
            .collect(),
    }
}

#[test]
fn test_single_controller_success() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["shoulder", "elbow"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_millis(20)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor
        .push(trajectory(&["shoulder", "elbow"], &[0, 50]), &[])
        .unwrap();
    let status = executor.execute_and_wait(true);

    assert_eq!(status, ExecutionStatus::Succeeded);
    assert_eq!(executor.last_execution_status(), ExecutionStatus::Succeeded);
    assert_eq!(executor.queued(), 0);

    let parts = manager.handle_for("arm").sent_parts();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].joint_names, vec!["elbow", "shoulder"]);
    assert_eq!(parts[0].points.len(), 2);
}

#[test]
fn test_split_across_two_controllers() {
    let manager = Arc::new(
        ScriptedManager::default()
            .with(
                "left",
                &["j1"],
                ACTIVE_DEFAULT,
                HandleScript::Finish(Duration::from_millis(10)),
            )
            .with(
                "right",
                &["j2"],
                ACTIVE_DEFAULT,
                HandleScript::Finish(Duration::from_millis(10)),
            ),
    );
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor
        .push(trajectory(&["j1", "j2"], &[0, 40]), &[])
        .unwrap();
    assert_eq!(executor.execute_and_wait(true), ExecutionStatus::Succeeded);

    let left = manager.handle_for("left").sent_parts();
    let right = manager.handle_for("right").sent_parts();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].joint_names, vec!["j1"]);
    assert_eq!(right[0].joint_names, vec!["j2"]);
}

#[test]
fn test_queue_executes_in_push_order() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_millis(5)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor.push(trajectory(&["j1"], &[0]), &[]).unwrap();
    executor.push(trajectory(&["j1"], &[0, 10, 20]), &[]).unwrap();
    assert_eq!(executor.execute_and_wait(true), ExecutionStatus::Succeeded);

    let parts = manager.handle_for("arm").sent_parts();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].points.len(), 1);
    assert_eq!(parts[1].points.len(), 3);
}

#[test]
fn test_push_while_running_fails() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_millis(200)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor.push(trajectory(&["j1"], &[0, 150]), &[]).unwrap();
    executor.execute(None, false);

    let err = executor.push(trajectory(&["j1"], &[0]), &[]).unwrap_err();
    assert!(matches!(err, ExecError::ExecutionInProgress));

    assert_eq!(executor.wait_for_execution(), ExecutionStatus::Succeeded);
}

#[test]
fn test_timeout_preempts_with_timed_out_status() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::NeverFinish,
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    // expected bound: 50ms * 1.1 + 500ms
    executor.push(trajectory(&["j1"], &[0, 50]), &[]).unwrap();
    let started = Instant::now();
    let status = executor.execute_and_wait(false);

    assert_eq!(status, ExecutionStatus::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(550));
    assert!(manager.handle_for("arm").was_cancelled());
}

#[test]
fn test_stop_preempts_without_overwriting_status() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_secs(2)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor.push(trajectory(&["j1"], &[0, 2000]), &[]).unwrap();
    executor.execute(None, false);
    std::thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    executor.stop_execution(false);

    assert_eq!(executor.last_execution_status(), ExecutionStatus::Preempted);
    assert!(manager.handle_for("arm").was_cancelled());
    // the worker noticed the cancellation instead of running out the clock
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(executor.wait_for_execution(), ExecutionStatus::Preempted);
}

#[test]
fn test_send_failure_aborts_and_cancels_sent_parts() {
    let manager = Arc::new(
        ScriptedManager::default()
            .with(
                "left",
                &["j1"],
                ACTIVE_DEFAULT,
                HandleScript::Finish(Duration::from_millis(10)),
            )
            .with("right", &["j2"], ACTIVE_DEFAULT, HandleScript::RejectSend),
    );
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor
        .push(trajectory(&["j1", "j2"], &[0, 30]), &[])
        .unwrap();
    assert_eq!(executor.execute_and_wait(false), ExecutionStatus::Aborted);

    // part 0 went out and was cancelled; part 1 never arrived
    assert!(manager.handle_for("left").was_cancelled());
    assert!(manager.handle_for("right").sent_parts().is_empty());
}

#[test]
fn test_controller_failure_propagates() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::FinishWith(Duration::from_millis(10), ExecutionStatus::Failed),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    executor.push(trajectory(&["j1"], &[0, 20]), &[]).unwrap();
    assert_eq!(executor.execute_and_wait(false), ExecutionStatus::Failed);
}

#[test]
fn test_minimal_cover_is_activated_over_defaults() {
    // one whole-body controller beats two defaults; activating it must
    // switch the overlapping halves off
    let manager = Arc::new(
        ScriptedManager::default()
            .with(
                "half_a",
                &["j1", "j2"],
                ACTIVE_DEFAULT,
                HandleScript::Finish(Duration::from_millis(10)),
            )
            .with(
                "half_b",
                &["j3", "j4"],
                ACTIVE_DEFAULT,
                HandleScript::Finish(Duration::from_millis(10)),
            )
            .with(
                "whole",
                &["j1", "j2", "j3", "j4"],
                INACTIVE,
                HandleScript::Finish(Duration::from_millis(10)),
            ),
    );
    let config = ExecConfig {
        manage_controllers: true,
        ..Default::default()
    };
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, config);

    executor
        .push(trajectory(&["j1", "j2", "j3", "j4"], &[0, 30]), &[])
        .unwrap();
    assert_eq!(executor.execute_and_wait(true), ExecutionStatus::Succeeded);

    assert_eq!(manager.handle_for("whole").sent_parts().len(), 1);
    assert!(manager.handle_for("half_a").sent_parts().is_empty());

    let switches = manager.switch_log();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].0, vec!["whole".to_string()]);
    assert_eq!(
        switches[0].1,
        vec!["half_a".to_string(), "half_b".to_string()]
    );
}

#[test]
fn test_ensure_active_unknown_controller() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_millis(10)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    let err = executor
        .ensure_active_controllers(&["ghost".to_string()])
        .unwrap_err();
    assert!(matches!(err, ExecError::UnknownController(_)));
}

#[test]
fn test_non_managing_host_requires_active_controllers() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        INACTIVE,
        HandleScript::Finish(Duration::from_millis(10)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    let err = executor.ensure_active_controller("arm").unwrap_err();
    assert!(matches!(err, ExecError::ControllerNotActive(_)));
}

#[test]
fn test_ensure_active_for_joints_loads_and_switches() {
    let cold = ControllerState {
        loaded: false,
        active: false,
        default_controller: false,
    };
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["shoulder", "elbow"],
        cold,
        HandleScript::Finish(Duration::from_millis(10)),
    ));
    let config = ExecConfig {
        manage_controllers: true,
        ..Default::default()
    };
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, config);

    executor
        .ensure_active_for_joints(&["shoulder".to_string()])
        .unwrap();

    assert_eq!(*manager.loads.lock(), vec!["arm".to_string()]);
    let switches = manager.switch_log();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0].0, vec!["arm".to_string()]);
    assert!(switches[0].1.is_empty());
}

#[test]
fn test_stop_event_preempts_and_clears() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_secs(2)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    let (tx, rx) = crossbeam_channel::unbounded::<String>();
    let listener = executor.attach_event_channel(rx);

    executor.push(trajectory(&["j1"], &[0, 2000]), &[]).unwrap();
    executor.execute(None, false);
    std::thread::sleep(Duration::from_millis(100));

    tx.send("warble".to_string()).unwrap(); // unknown events are ignored
    tx.send("stop".to_string()).unwrap();
    drop(tx);
    listener.join().unwrap();

    assert_eq!(executor.wait_for_execution(), ExecutionStatus::Preempted);
    assert_eq!(executor.queued(), 0);
}

#[test]
fn test_expected_index_tracks_progress() {
    let manager = Arc::new(ScriptedManager::default().with(
        "arm",
        &["j1"],
        ACTIVE_DEFAULT,
        HandleScript::Finish(Duration::from_millis(400)),
    ));
    let executor = TrajectoryExecutor::new(Arc::clone(&manager) as _, None, ExecConfig::default());

    assert!(executor.current_expected_index().is_none());

    executor
        .push(trajectory(&["j1"], &[0, 100, 200, 300, 400]), &[])
        .unwrap();
    executor.execute(None, false);
    std::thread::sleep(Duration::from_millis(150));

    let (context, point) = executor.current_expected_index().unwrap();
    assert_eq!(context, 0);
    let point = point.unwrap();
    assert!(point >= 1 && point <= 3, "expected mid-trajectory, got {point}");

    executor.wait_for_execution();
    assert!(executor.current_expected_index().is_none());
}
