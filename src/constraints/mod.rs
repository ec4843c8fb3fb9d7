use crate::common::{Arena, Handle, PhysicsError, Result};
use crate::math::{Real, Scalar, Vec2};
use crate::objects::{BodyHandle, RigidBody};

pub mod distance_joint;
pub mod friction_joint;
pub mod gear_joint;
pub mod motor_joint;
pub mod mouse_joint;
pub mod prismatic_joint;
pub mod pulley_joint;
pub mod revolute_joint;
pub mod rope_joint;
pub mod weld_joint;
pub mod wheel_joint;

// Re-export the joint types for easier access
pub use distance_joint::{DistanceJoint, DistanceJointDef};
pub use friction_joint::{FrictionJoint, FrictionJointDef};
pub use gear_joint::{GearJoint, GearJointDef};
pub use motor_joint::{MotorJoint, MotorJointDef};
pub use mouse_joint::{MouseJoint, MouseJointDef};
pub use prismatic_joint::{PrismaticJoint, PrismaticJointDef};
pub use pulley_joint::{PulleyJoint, PulleyJointDef};
pub use revolute_joint::{RevoluteJoint, RevoluteJointDef};
pub use rope_joint::{RopeJoint, RopeJointDef};
pub use weld_joint::{WeldJoint, WeldJointDef};
pub use wheel_joint::{WheelJoint, WheelJointDef};

pub type JointHandle = Handle<Joint>;

/// Center of mass position and angle of an island body during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: Real,
}

/// Linear and angular velocity of an island body during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: Real,
}

/// Parameters of one (sub-)step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeStep {
    pub dt: Real,
    /// Inverse time step (0 if dt == 0).
    pub inv_dt: Real,
    /// dt * inv_dt0
    pub dt_ratio: Real,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Solver state shared by the contacts and joints of one island, indexed by
/// each body's island index.
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Joint limit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Revolute,
    Prismatic,
    Distance,
    Pulley,
    Mouse,
    Gear,
    Wheel,
    Weld,
    Friction,
    Rope,
    Motor,
}

/// Data every joint carries: the connected bodies and a snapshot of their
/// mass properties taken when an island solve starts.
#[derive(Debug, Clone, PartialEq)]
pub struct JointBase {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) island_flag: bool,
    pub user_data: u64,

    // Solver temp
    pub(crate) index_a: usize,
    pub(crate) index_b: usize,
    pub(crate) local_center_a: Vec2,
    pub(crate) local_center_b: Vec2,
    pub(crate) inv_mass_a: Real,
    pub(crate) inv_mass_b: Real,
    pub(crate) inv_i_a: Real,
    pub(crate) inv_i_b: Real,
}

impl JointBase {
    pub(crate) fn new(body_a: BodyHandle, body_b: BodyHandle, collide_connected: bool, user_data: u64) -> Self {
        JointBase {
            body_a,
            body_b,
            collide_connected,
            island_flag: false,
            user_data,
            index_a: 0,
            index_b: 0,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: Real::ZERO,
            inv_mass_b: Real::ZERO,
            inv_i_a: Real::ZERO,
            inv_i_b: Real::ZERO,
        }
    }

    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Copies island indices and mass properties of both bodies.
    pub(crate) fn prepare(&mut self, bodies: &Arena<RigidBody>) {
        let a = &bodies[self.body_a];
        let b = &bodies[self.body_b];
        self.index_a = a.island_index;
        self.index_b = b.island_index;
        self.local_center_a = a.sweep.local_center;
        self.local_center_b = b.sweep.local_center;
        self.inv_mass_a = a.inv_mass;
        self.inv_mass_b = b.inv_mass;
        self.inv_i_a = a.inv_inertia;
        self.inv_i_b = b.inv_inertia;
    }

    /// Opening lines shared by every joint dump.
    pub(crate) fn dump_begin(&self, kind: &str) {
        use crate::common::DUMP_TARGET;
        log::info!(target: DUMP_TARGET, "  let jd = {} {{", kind);
        log::info!(target: DUMP_TARGET, "      body_a: bodies[&{}],", self.body_a.index());
        log::info!(target: DUMP_TARGET, "      body_b: bodies[&{}],", self.body_b.index());
        log::info!(target: DUMP_TARGET, "      collide_connected: {},", self.collide_connected);
        log::info!(target: DUMP_TARGET, "      user_data: {},", self.user_data);
    }

    pub(crate) fn dump_end(&self, index: usize) {
        use crate::common::DUMP_TARGET;
        log::info!(target: DUMP_TARGET, "  }};");
        log::info!(target: DUMP_TARGET, "  joints.insert({}, world.create_joint(jd)?);", index);
    }
}

/// Formats a vector the way dump scripts construct it.
pub(crate) fn dump_vec(v: Vec2) -> String {
    format!("Vec2::new({:.9e}, {:.9e})", v.x, v.y)
}

/// Protocol shared by every joint: a velocity pass with warm starting and a
/// position pass that reports convergence.
pub trait Constraint {
    fn base(&self) -> &JointBase;

    fn base_mut(&mut self) -> &mut JointBase;

    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>, bodies: &Arena<RigidBody>);

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>);

    /// Returns true when the position error is within tolerance.
    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool;

    /// Anchor point on body A in world coordinates.
    fn anchor_a(&self, body_a: &RigidBody) -> Vec2;

    /// Anchor point on body B in world coordinates.
    fn anchor_b(&self, body_b: &RigidBody) -> Vec2;

    /// Reaction force on body B at the joint anchor in Newtons.
    fn reaction_force(&self, inv_dt: Real) -> Vec2;

    /// Reaction torque on body B in N*m.
    fn reaction_torque(&self, inv_dt: Real) -> Real;

    /// Emits a reconstruction script for this joint.
    fn dump(&self, index: usize);
}

/// A joint owned by the world.
#[derive(Debug, Clone)]
pub enum Joint {
    Distance(DistanceJoint),
    Friction(FrictionJoint),
    Gear(GearJoint),
    Motor(MotorJoint),
    Mouse(MouseJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Revolute(RevoluteJoint),
    Rope(RopeJoint),
    Weld(WeldJoint),
    Wheel(WheelJoint),
}

macro_rules! dispatch {
    ($joint:expr, $j:ident => $body:expr) => {
        match $joint {
            Joint::Distance($j) => $body,
            Joint::Friction($j) => $body,
            Joint::Gear($j) => $body,
            Joint::Motor($j) => $body,
            Joint::Mouse($j) => $body,
            Joint::Prismatic($j) => $body,
            Joint::Pulley($j) => $body,
            Joint::Revolute($j) => $body,
            Joint::Rope($j) => $body,
            Joint::Weld($j) => $body,
            Joint::Wheel($j) => $body,
        }
    };
}

impl Joint {
    pub fn joint_type(&self) -> JointType {
        match self {
            Joint::Distance(_) => JointType::Distance,
            Joint::Friction(_) => JointType::Friction,
            Joint::Gear(_) => JointType::Gear,
            Joint::Motor(_) => JointType::Motor,
            Joint::Mouse(_) => JointType::Mouse,
            Joint::Prismatic(_) => JointType::Prismatic,
            Joint::Pulley(_) => JointType::Pulley,
            Joint::Revolute(_) => JointType::Revolute,
            Joint::Rope(_) => JointType::Rope,
            Joint::Weld(_) => JointType::Weld,
            Joint::Wheel(_) => JointType::Wheel,
        }
    }

    pub fn as_constraint(&self) -> &dyn Constraint {
        dispatch!(self, j => j)
    }

    pub fn as_constraint_mut(&mut self) -> &mut dyn Constraint {
        dispatch!(self, j => j)
    }

    pub fn base(&self) -> &JointBase {
        self.as_constraint().base()
    }

    pub fn body_a(&self) -> BodyHandle {
        self.base().body_a
    }

    pub fn body_b(&self) -> BodyHandle {
        self.base().body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.base().collide_connected
    }

    pub fn user_data(&self) -> u64 {
        self.base().user_data
    }

    /// Builds a joint from its definition. Gear joints resolve their two
    /// coupled joints through `joints`.
    pub(crate) fn create(def: &JointDef, bodies: &Arena<RigidBody>, joints: &Arena<Joint>) -> Result<Joint> {
        if let Some((body_a, body_b)) = def.bodies() {
            if !bodies.contains(body_a) || !bodies.contains(body_b) {
                return Err(PhysicsError::InvalidHandle("body"));
            }
            if body_a == body_b {
                return Err(PhysicsError::SelfJoint);
            }
        }

        Ok(match def {
            JointDef::Distance(d) => Joint::Distance(DistanceJoint::new(d)),
            JointDef::Friction(d) => Joint::Friction(FrictionJoint::new(d)),
            JointDef::Gear(d) => {
                let joint1 = joints.get(d.joint1).ok_or(PhysicsError::InvalidHandle("joint"))?;
                let joint2 = joints.get(d.joint2).ok_or(PhysicsError::InvalidHandle("joint"))?;
                Joint::Gear(GearJoint::new(d, d.joint1, joint1, d.joint2, joint2, bodies)?)
            }
            JointDef::Motor(d) => Joint::Motor(MotorJoint::new(d)),
            JointDef::Mouse(d) => Joint::Mouse(MouseJoint::new(d, &bodies[d.body_b])),
            JointDef::Prismatic(d) => Joint::Prismatic(PrismaticJoint::new(d)),
            JointDef::Pulley(d) => Joint::Pulley(PulleyJoint::new(d)),
            JointDef::Revolute(d) => Joint::Revolute(RevoluteJoint::new(d)),
            JointDef::Rope(d) => Joint::Rope(RopeJoint::new(d)),
            JointDef::Weld(d) => Joint::Weld(WeldJoint::new(d)),
            JointDef::Wheel(d) => Joint::Wheel(WheelJoint::new(d)),
        })
    }
}

/// Definition of any joint, consumed by `PhysicsWorld::create_joint`.
#[derive(Debug, Clone, PartialEq)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Rope(RopeJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
}

impl JointDef {
    /// The two bodies named by the definition. Gear definitions name joints
    /// instead; their bodies are resolved on creation.
    pub fn bodies(&self) -> Option<(BodyHandle, BodyHandle)> {
        let pair = match self {
            JointDef::Distance(d) => (d.body_a, d.body_b),
            JointDef::Friction(d) => (d.body_a, d.body_b),
            JointDef::Gear(_) => return None,
            JointDef::Motor(d) => (d.body_a, d.body_b),
            JointDef::Mouse(d) => (d.body_a, d.body_b),
            JointDef::Prismatic(d) => (d.body_a, d.body_b),
            JointDef::Pulley(d) => (d.body_a, d.body_b),
            JointDef::Revolute(d) => (d.body_a, d.body_b),
            JointDef::Rope(d) => (d.body_a, d.body_b),
            JointDef::Weld(d) => (d.body_a, d.body_b),
            JointDef::Wheel(d) => (d.body_a, d.body_b),
        };
        Some(pair)
    }
}

macro_rules! impl_from_def {
    ($($variant:ident($def:ty)),* $(,)?) => {
        $(impl From<$def> for JointDef {
            fn from(def: $def) -> Self {
                JointDef::$variant(def)
            }
        })*
    };
}

impl_from_def!(
    Distance(DistanceJointDef),
    Friction(FrictionJointDef),
    Gear(GearJointDef),
    Motor(MotorJointDef),
    Mouse(MouseJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Revolute(RevoluteJointDef),
    Rope(RopeJointDef),
    Weld(WeldJointDef),
    Wheel(WheelJointDef),
);

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::objects::{BodyDef, BodyType};

    /// Two bodies laid out as a two-body island with unit mass properties.
    pub struct Rig {
        pub bodies: Arena<RigidBody>,
        pub a: BodyHandle,
        pub b: BodyHandle,
        pub positions: Vec<Position>,
        pub velocities: Vec<Velocity>,
    }

    impl Rig {
        pub fn new(def_a: &BodyDef, def_b: &BodyDef) -> Self {
            let mut bodies = Arena::new();
            let a = bodies.insert_with(|h| RigidBody::new(h, def_a));
            let b = bodies.insert_with(|h| RigidBody::new(h, def_b));
            let mut positions = Vec::new();
            let mut velocities = Vec::new();
            for (i, handle) in [a, b].into_iter().enumerate() {
                let body = &mut bodies[handle];
                if body.body_type == BodyType::Dynamic {
                    body.inertia = 1.0;
                    body.inv_inertia = 1.0;
                }
                body.island_index = i;
                positions.push(Position {
                    c: body.sweep.c,
                    a: body.sweep.a,
                });
                velocities.push(Velocity {
                    v: body.linear_velocity,
                    w: body.angular_velocity,
                });
            }
            Rig {
                bodies,
                a,
                b,
                positions,
                velocities,
            }
        }

        pub fn step() -> TimeStep {
            TimeStep {
                dt: 1.0 / 60.0,
                inv_dt: 60.0,
                dt_ratio: 1.0,
                velocity_iterations: 8,
                position_iterations: 3,
                warm_starting: true,
            }
        }

        /// Runs one velocity phase and returns the data for inspection.
        pub fn solve_velocity(&mut self, joint: &mut dyn Constraint, iterations: usize) {
            let mut data = SolverData {
                step: Self::step(),
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };
            joint.init_velocity_constraints(&mut data, &self.bodies);
            for _ in 0..iterations {
                joint.solve_velocity_constraints(&mut data);
            }
        }

        /// Runs position iterations until the joint reports convergence.
        pub fn solve_position(&mut self, joint: &mut dyn Constraint, iterations: usize) -> bool {
            let mut data = SolverData {
                step: Self::step(),
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };
            (0..iterations).any(|_| joint.solve_position_constraints(&mut data))
        }
    }
}
