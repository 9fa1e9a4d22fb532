//! Rigid body physics on rapier2d

use std::collections::HashMap;
use std::sync::Mutex;

use glam::Vec2;
use rapier2d::prelude::*;

use super::{
    BodyDesc, BodyId, BodyMode, CollisionGroups, CollisionMask, ConstraintDesc, ConstraintId,
    ContactEvent, PhysicsEngine, Shape,
};

/// Body tracked by the engine
struct TrackedBody {
    /// Rigid body handle in rapier world
    handle: RigidBodyHandle,

    /// Collider handle, absent for shapeless bodies (animation proxies)
    collider: Option<ColliderHandle>,
}

/// Collects collision events emitted during a pipeline step
#[derive(Default)]
struct ContactRecorder {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventHandler for ContactRecorder {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Manages rapier2d physics world
pub struct RapierWorld {
    /// Rapier rigid body set
    rigid_body_set: RigidBodySet,

    /// Rapier collider set
    collider_set: ColliderSet,

    /// Physics pipeline
    pipeline: PhysicsPipeline,

    /// Integration parameters
    integration_parameters: IntegrationParameters,

    /// Island manager
    island_manager: IslandManager,

    /// Broad phase
    broad_phase: BroadPhase,

    /// Narrow phase
    narrow_phase: NarrowPhase,

    /// Impulse joint set
    impulse_joint_set: ImpulseJointSet,

    /// Multibody joint set
    multibody_joint_set: MultibodyJointSet,

    /// CCD solver
    ccd_solver: CCDSolver,

    /// Query pipeline
    query_pipeline: QueryPipeline,

    /// Gravity in pixels/s^2 (+y is down)
    gravity: Vector<Real>,

    /// Engine-neutral handles
    bodies: HashMap<BodyId, TrackedBody>,
    joints: HashMap<ConstraintId, ImpulseJointHandle>,
    next_id: u64,

    /// Collision events from the last steps, drained by the stage
    recorder: ContactRecorder,
}

impl RapierWorld {
    pub fn new(gravity: Vec2) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: 1.0 / 60.0, // 60 FPS
            ..Default::default()
        };

        log::debug!(
            "Physics: rapier world created, gravity=({:.1}, {:.1})",
            gravity.x,
            gravity.y
        );

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            pipeline: PhysicsPipeline::new(),
            integration_parameters,
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            gravity: vector![gravity.x, gravity.y],
            bodies: HashMap::new(),
            joints: HashMap::new(),
            next_id: 1,
            recorder: ContactRecorder::default(),
        }
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn handle(&self, body: BodyId) -> Option<RigidBodyHandle> {
        self.bodies.get(&body).map(|tracked| tracked.handle)
    }

    fn rigid_body(&self, body: BodyId) -> Option<&RigidBody> {
        self.handle(body).and_then(|h| self.rigid_body_set.get(h))
    }

    fn rigid_body_mut(&mut self, body: BodyId, op: &str) -> Option<&mut RigidBody> {
        let found = self
            .bodies
            .get(&body)
            .and_then(|tracked| self.rigid_body_set.get_mut(tracked.handle));
        if found.is_none() {
            log::error!("Physics: {} on unknown body {:?}", op, body);
        }
        found
    }

    fn body_id_of_collider(&self, collider: ColliderHandle) -> Option<BodyId> {
        let parent = self.collider_set.get(collider)?.parent()?;
        self.bodies
            .iter()
            .find(|(_, tracked)| tracked.handle == parent)
            .map(|(id, _)| *id)
    }

    /// Per-step normalized stiffness to rapier's acceleration-based spring
    fn motor_gains(&self, stiffness: f32, damping: f32) -> (Real, Real) {
        let dt = self.integration_parameters.dt;
        let k = stiffness.clamp(0.0, 1.0) / (dt * dt);
        let c = damping.clamp(0.0, 1.0) * 2.0 * k.sqrt();
        (k, c)
    }

    /// Per-step velocity loss fraction to rapier's per-second damping
    fn damping_coefficient(&self, fraction: f32) -> Real {
        let f = fraction.clamp(0.0, 0.99);
        f / (self.integration_parameters.dt * (1.0 - f))
    }

    fn damping_fraction(&self, coefficient: Real) -> f32 {
        let c = coefficient * self.integration_parameters.dt;
        c / (1.0 + c)
    }

    fn rigid_body_type(mode: BodyMode) -> RigidBodyType {
        match mode {
            BodyMode::Dynamic => RigidBodyType::Dynamic,
            BodyMode::Kinematic => RigidBodyType::KinematicPositionBased,
            BodyMode::Fixed => RigidBodyType::Fixed,
        }
    }

    fn interaction_groups(mask: CollisionMask) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(mask.memberships.bits()),
            Group::from_bits_truncate(mask.filter.bits()),
        )
    }
}

impl Default for RapierWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, 980.0))
    }
}

impl PhysicsEngine for RapierWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId {
        let rigid_body = RigidBodyBuilder::new(Self::rigid_body_type(desc.mode))
            .translation(vector![desc.position.x, desc.position.y])
            .rotation(desc.angle)
            .linear_damping(self.damping_coefficient(desc.linear_damping))
            .build();
        let handle = self.rigid_body_set.insert(rigid_body);

        let collider = desc.shape.map(|shape| {
            let builder = match shape {
                Shape::Rect { half_extents } => {
                    ColliderBuilder::cuboid(half_extents.x, half_extents.y)
                }
                Shape::Circle { radius } => ColliderBuilder::ball(radius),
            };
            let collider = builder
                .density(desc.density)
                .friction(desc.friction)
                .restitution(desc.restitution)
                .sensor(desc.sensor)
                .collision_groups(Self::interaction_groups(desc.collision))
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build();
            self.collider_set
                .insert_with_parent(collider, handle, &mut self.rigid_body_set)
        });

        let id = BodyId(self.allocate());
        self.bodies.insert(id, TrackedBody { handle, collider });
        log::trace!("Physics: created body {:?} ({:?})", id, desc.mode);
        id
    }

    fn destroy_body(&mut self, body: BodyId) {
        let Some(tracked) = self.bodies.remove(&body) else {
            log::error!("Physics: destroy of unknown body {:?}", body);
            return;
        };
        self.rigid_body_set.remove(
            tracked.handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        // Joints attached to the body went with it
        let impulse_joint_set = &self.impulse_joint_set;
        self.joints
            .retain(|_, handle| impulse_joint_set.get(*handle).is_some());
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> ConstraintId {
        let id = ConstraintId(self.allocate());
        let (Some(a), Some(b)) = (self.handle(desc.body_a), self.handle(desc.body_b)) else {
            log::error!(
                "Physics: constraint between unknown bodies {:?} / {:?}",
                desc.body_a,
                desc.body_b
            );
            return id;
        };

        let (stiffness, damping) = self.motor_gains(desc.stiffness, desc.damping);
        // Free joint pulled together by positional motors; the rest length
        // is measured along the first body's local x axis.
        let joint = GenericJointBuilder::new(JointAxesMask::empty())
            .local_anchor1(point![desc.anchor_a.x, desc.anchor_a.y])
            .local_anchor2(point![desc.anchor_b.x, desc.anchor_b.y])
            .motor_position(JointAxis::X, desc.rest_length, stiffness, damping)
            .motor_position(JointAxis::Y, 0.0, stiffness, damping)
            .build();

        let handle = self.impulse_joint_set.insert(a, b, joint, true);
        self.joints.insert(id, handle);
        id
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) {
        match self.joints.remove(&constraint) {
            Some(handle) => {
                self.impulse_joint_set.remove(handle, true);
            }
            None => log::error!("Physics: destroy of unknown constraint {:?}", constraint),
        }
    }

    fn position(&self, body: BodyId) -> Option<Vec2> {
        self.rigid_body(body).map(|rb| {
            let translation = rb.translation();
            Vec2::new(translation.x, translation.y)
        })
    }

    fn angle(&self, body: BodyId) -> Option<f32> {
        self.rigid_body(body).map(|rb| rb.rotation().angle())
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec2> {
        self.rigid_body(body).map(|rb| {
            let linvel = rb.linvel();
            Vec2::new(linvel.x, linvel.y)
        })
    }

    fn angular_velocity(&self, body: BodyId) -> Option<f32> {
        self.rigid_body(body).map(|rb| rb.angvel())
    }

    fn set_position(&mut self, body: BodyId, position: Vec2) {
        if let Some(rb) = self.rigid_body_mut(body, "set_position") {
            rb.set_translation(vector![position.x, position.y], true);
        }
    }

    fn set_angle(&mut self, body: BodyId, angle: f32) {
        if let Some(rb) = self.rigid_body_mut(body, "set_angle") {
            rb.set_rotation(Rotation::new(angle), true);
        }
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(rb) = self.rigid_body_mut(body, "set_linear_velocity") {
            rb.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: f32) {
        if let Some(rb) = self.rigid_body_mut(body, "set_angular_velocity") {
            rb.set_angvel(velocity, true);
        }
    }

    fn body_mode(&self, body: BodyId) -> Option<BodyMode> {
        self.rigid_body(body).map(|rb| match rb.body_type() {
            RigidBodyType::Dynamic => BodyMode::Dynamic,
            RigidBodyType::Fixed => BodyMode::Fixed,
            _ => BodyMode::Kinematic,
        })
    }

    fn set_body_mode(&mut self, body: BodyId, mode: BodyMode) {
        if let Some(rb) = self.rigid_body_mut(body, "set_body_mode") {
            rb.set_body_type(Self::rigid_body_type(mode), true);
        }
    }

    fn collision_mask(&self, body: BodyId) -> Option<CollisionMask> {
        let collider = self.bodies.get(&body)?.collider?;
        let groups = self.collider_set.get(collider)?.collision_groups();
        Some(CollisionMask::new(
            CollisionGroups::from_bits_truncate(groups.memberships.bits()),
            CollisionGroups::from_bits_truncate(groups.filter.bits()),
        ))
    }

    fn set_collision_mask(&mut self, body: BodyId, mask: CollisionMask) {
        let collider = self.bodies.get(&body).and_then(|tracked| tracked.collider);
        match collider.and_then(|c| self.collider_set.get_mut(c)) {
            Some(collider) => collider.set_collision_groups(Self::interaction_groups(mask)),
            None => log::error!("Physics: set_collision_mask on body {:?} without collider", body),
        }
    }

    fn linear_damping(&self, body: BodyId) -> Option<f32> {
        self.rigid_body(body)
            .map(|rb| self.damping_fraction(rb.linear_damping()))
    }

    fn set_linear_damping(&mut self, body: BodyId, damping: f32) {
        let coefficient = self.damping_coefficient(damping);
        if let Some(rb) = self.rigid_body_mut(body, "set_linear_damping") {
            rb.set_linear_damping(coefficient);
        }
    }

    /// Update physics simulation
    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        let physics_hooks = ();

        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &physics_hooks,
            &self.recorder,
        );
    }

    fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
        let raw = match self.recorder.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => return Vec::new(),
        };

        raw.into_iter()
            .filter_map(|event| {
                let a = self.body_id_of_collider(event.collider1())?;
                let b = self.body_id_of_collider(event.collider2())?;
                Some(if event.started() {
                    ContactEvent::Started(a, b)
                } else {
                    ContactEvent::Ended(a, b)
                })
            })
            .collect()
    }
}
