//! Per-joint motion semantics and the axis-aligned action primitives.
//!
//! A [`JointMotionModel`] answers discretisation and distance questions for
//! one active joint; an [`ActionPrimitive`] advances one joint by one signed
//! step. The environment builds two primitives (±step) per joint in
//! declaration order.

use crate::core::math::{normalize_angle, shortest_angular_distance};

/// Tolerance absorbing floating-point noise in step-count arithmetic, so an
/// exact multiple of the step never rounds up to an extra step.
const STEP_EPSILON: f64 = 1e-9;

/// Static description of one active joint, as declared by the host's
/// kinematic model.
#[derive(Clone, Debug)]
pub struct JointModel {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    /// Whether the joint wraps mod 2π.
    pub continuous: bool,
}

impl JointModel {
    pub fn bounded(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            continuous: false,
        }
    }

    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lower: -std::f64::consts::PI,
            upper: std::f64::consts::PI,
            continuous: true,
        }
    }
}

/// Discretisation and distance semantics for one joint.
#[derive(Clone, Debug)]
pub struct JointMotionModel {
    joint: JointModel,
}

impl JointMotionModel {
    pub fn new(joint: JointModel) -> Self {
        Self { joint }
    }

    pub fn joint(&self) -> &JointModel {
        &self.joint
    }

    /// Quantise an angle into its integer bucket at resolution `step`.
    ///
    /// Continuous joints are wrapped into (-π, π] first so that equal
    /// configurations hash to equal coordinates.
    pub fn discretize(&self, angle: f64, step: f64) -> i32 {
        let a = if self.joint.continuous {
            normalize_angle(angle)
        } else {
            angle
        };
        (a / step).round() as i32
    }

    /// Signed displacement from `from` to `to` under this joint's topology.
    ///
    /// For continuous joints this is the shortest way around the circle;
    /// for bounded joints the target is clamped into the limits first.
    fn displacement(&self, from: f64, to: f64) -> f64 {
        if self.joint.continuous {
            shortest_angular_distance(from, to)
        } else {
            to.clamp(self.joint.lower, self.joint.upper) - from
        }
    }

    /// Number of whole `step` increments separating two angles.
    pub fn integer_distance(&self, from: f64, to: f64, step: f64) -> i32 {
        let d = self.displacement(from, to).abs();
        ((d / step) - STEP_EPSILON).ceil().max(0.0) as i32
    }

    /// Whether at least one more `step` toward `to` is possible.
    pub fn can_get_closer(&self, from: f64, to: f64, step: f64) -> bool {
        self.integer_distance(from, to, step) > 0
    }

    /// Advance the angle by `delta`, respecting topology.
    ///
    /// Returns `None` when a bounded joint would leave its limits.
    pub fn apply_delta(&self, angle: f64, delta: f64) -> Option<f64> {
        let raw = angle + delta;
        if self.joint.continuous {
            Some(normalize_angle(raw))
        } else if raw < self.joint.lower || raw > self.joint.upper {
            None
        } else {
            Some(raw)
        }
    }
}

/// One axis-aligned motion: a signed step on a single joint.
#[derive(Clone, Copy, Debug)]
pub struct ActionPrimitive {
    pub joint_index: usize,
    pub delta: f64,
}

impl ActionPrimitive {
    pub fn new(joint_index: usize, delta: f64) -> Self {
        Self { joint_index, delta }
    }

    /// Produce the successor configuration, or `None` if the step is
    /// rejected by the joint's limits.
    ///
    /// Exactly one component of the source is mutated.
    pub fn generate_successor(
        &self,
        models: &[JointMotionModel],
        source: &[f64],
    ) -> Option<Vec<f64>> {
        let next = models[self.joint_index].apply_delta(source[self.joint_index], self.delta)?;
        let mut out = source.to_vec();
        out[self.joint_index] = next;
        Some(out)
    }
}

/// Build the ± step primitive pair for each joint, in declaration order.
pub fn build_primitives(models: &[JointMotionModel], step: f64) -> Vec<ActionPrimitive> {
    let mut actions = Vec::with_capacity(models.len() * 2);
    for i in 0..models.len() {
        actions.push(ActionPrimitive::new(i, step));
        actions.push(ActionPrimitive::new(i, -step));
    }
    actions
}
