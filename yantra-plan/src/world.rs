//! External collaborator interfaces.
//!
//! The planner does not own a robot model, a collision engine, or a distance
//! field. The host implements these traits and lends them to a
//! [`PlanningEnvironment`](crate::PlanningEnvironment) for the duration of
//! one query through a [`SceneView`].

/// Forward kinematics for the planning group's end-effector link.
pub trait Kinematics {
    /// World-frame position of the end-effector at the given joint values.
    ///
    /// Joint values are ordered as the active joints were declared.
    fn end_effector_position(&self, joint_values: &[f64]) -> [f64; 3];
}

/// Full-body collision query at a joint configuration.
pub trait CollisionChecker {
    /// Returns whether the robot collides with itself or the world at the
    /// given configuration.
    ///
    /// An `Err` means the collision engine cannot answer at all; during
    /// setup this aborts the query, during expansion it prunes the
    /// candidate.
    fn in_collision(&self, joint_values: &[f64]) -> std::result::Result<bool, String>;
}

/// Read-only view over a voxelised distance field.
pub trait DistanceField {
    /// Cell counts along x, y, z.
    fn num_cells(&self) -> (usize, usize, usize);

    /// Edge length of one voxel in meters.
    fn resolution(&self) -> f64;

    /// Map a world position to a voxel, or `None` if outside the field.
    fn world_to_grid(&self, position: [f64; 3]) -> Option<(i32, i32, i32)>;

    /// Center of a voxel in world coordinates, or `None` if out of range.
    fn grid_to_world(&self, x: i32, y: i32, z: i32) -> Option<[f64; 3]>;

    /// Distance to the nearest obstacle surface from a cell, in meters.
    fn distance_from_cell(&self, x: i32, y: i32, z: i32) -> f64;
}

/// Everything the environment borrows from the host for one planning query.
///
/// The self and world fields must share dimensions and resolution; setup
/// rejects the pair otherwise.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub collision: &'a dyn CollisionChecker,
    pub kinematics: &'a dyn Kinematics,
    pub self_field: &'a dyn DistanceField,
    pub world_field: &'a dyn DistanceField,
}
