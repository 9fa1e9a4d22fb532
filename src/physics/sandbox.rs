//! Deterministic position-based sandbox engine
//!
//! No external physics engine: explicit Euler integration, iterative
//! constraint projection and box-vs-box contact resolution against
//! non-dynamic bodies. Good enough to let a ragdoll fall, land and be pulled
//! around by springs, and fully reproducible, which makes it the engine of
//! choice for headless playback and tests.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::{
    BodyDesc, BodyId, BodyMode, CollisionMask, ConstraintDesc, ConstraintId, ContactEvent,
    PhysicsEngine, Shape,
};

/// Constraint projection passes per step
const DEFAULT_ITERATIONS: usize = 4;

#[derive(Debug, Clone)]
struct SandboxBody {
    position: Vec2,
    angle: f32,
    linvel: Vec2,
    angvel: f32,
    mode: BodyMode,
    shape: Option<Shape>,
    density: f32,
    friction: f32,
    restitution: f32,
    linear_damping: f32,
    collision: CollisionMask,
    sensor: bool,
}

impl SandboxBody {
    fn inverse_mass(&self) -> f32 {
        if self.mode != BodyMode::Dynamic {
            return 0.0;
        }
        match self.shape {
            Some(shape) => {
                let mass = shape.area() * self.density;
                if mass > f32::EPSILON {
                    1.0 / mass
                } else {
                    1.0
                }
            }
            None => 1.0,
        }
    }

    /// World-space half extents of the rotated shape
    fn aabb_half_extents(&self) -> Option<Vec2> {
        let shape = self.shape?;
        Some(match shape {
            Shape::Circle { radius } => Vec2::splat(radius),
            Shape::Rect { half_extents } => {
                let (s, c) = self.angle.sin_cos();
                Vec2::new(
                    c.abs() * half_extents.x + s.abs() * half_extents.y,
                    s.abs() * half_extents.x + c.abs() * half_extents.y,
                )
            }
        })
    }

    fn world_point(&self, local: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.angle).rotate(local)
    }
}

/// Small deterministic engine implementing [`PhysicsEngine`]
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    gravity: Vec2,
    iterations: usize,
    bodies: BTreeMap<BodyId, SandboxBody>,
    constraints: BTreeMap<ConstraintId, ConstraintDesc>,
    next_id: u64,
    /// Pairs currently overlapping, ordered (low id, high id)
    touching: BTreeSet<(BodyId, BodyId)>,
    events: Vec<ContactEvent>,
}

impl SandboxWorld {
    /// Create an empty world with the given gravity (pixels/s^2, +y is down)
    pub fn new(gravity: Vec2) -> Self {
        Self {
            gravity,
            iterations: DEFAULT_ITERATIONS,
            bodies: BTreeMap::new(),
            constraints: BTreeMap::new(),
            next_id: 1,
            touching: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    /// World without gravity, handy when only scripted motion matters
    pub fn weightless() -> Self {
        Self::new(Vec2::ZERO)
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    pub fn set_iterations(&mut self, iterations: usize) {
        self.iterations = iterations.max(1);
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Queue a synthetic contact event, delivered by the next drain
    pub fn inject_contact(&mut self, event: ContactEvent) {
        self.events.push(event);
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn body_mut_or_log(&mut self, body: BodyId, op: &str) -> Option<&mut SandboxBody> {
        let found = self.bodies.get_mut(&body);
        if found.is_none() {
            log::error!("Sandbox: {} on unknown body {:?}", op, body);
        }
        found
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.gravity;
        for body in self.bodies.values_mut() {
            if body.mode != BodyMode::Dynamic {
                continue;
            }
            body.linvel += gravity * dt;
            body.linvel *= (1.0 - body.linear_damping).clamp(0.0, 1.0);
            body.position += body.linvel * dt;
            body.angle += body.angvel * dt;
        }
    }

    fn project_constraints(&mut self) {
        for _ in 0..self.iterations {
            for desc in self.constraints.values() {
                let (Some(a), Some(b)) = (self.bodies.get(&desc.body_a), self.bodies.get(&desc.body_b))
                else {
                    continue;
                };
                let inv_a = a.inverse_mass();
                let inv_b = b.inverse_mass();
                let total = inv_a + inv_b;
                if total <= 0.0 {
                    continue;
                }

                let delta = b.world_point(desc.anchor_b) - a.world_point(desc.anchor_a);
                let distance = delta.length();
                if distance <= f32::EPSILON {
                    continue;
                }
                let correction =
                    delta / distance * (distance - desc.rest_length) * desc.stiffness.clamp(0.0, 1.0);

                if let Some(a) = self.bodies.get_mut(&desc.body_a) {
                    a.position += correction * (inv_a / total);
                }
                if let Some(b) = self.bodies.get_mut(&desc.body_b) {
                    b.position -= correction * (inv_b / total);
                }
            }
        }
    }

    fn damp_constraints(&mut self) {
        for desc in self.constraints.values() {
            let (Some(a), Some(b)) = (self.bodies.get(&desc.body_a), self.bodies.get(&desc.body_b))
            else {
                continue;
            };
            let inv_a = a.inverse_mass();
            let inv_b = b.inverse_mass();
            let total = inv_a + inv_b;
            let axis = (b.position - a.position).normalize_or_zero();
            if total <= 0.0 || axis == Vec2::ZERO {
                continue;
            }
            let along = axis * (b.linvel - a.linvel).dot(axis) * desc.damping.clamp(0.0, 1.0);

            if let Some(a) = self.bodies.get_mut(&desc.body_a) {
                a.linvel += along * (inv_a / total);
            }
            if let Some(b) = self.bodies.get_mut(&desc.body_b) {
                b.linvel -= along * (inv_b / total);
            }
        }
    }

    fn resolve_contacts(&mut self) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        let mut overlapping = BTreeSet::new();

        for (i, &id_a) in ids.iter().enumerate() {
            for &id_b in &ids[i + 1..] {
                let (a, b) = (&self.bodies[&id_a], &self.bodies[&id_b]);
                if a.mode != BodyMode::Dynamic && b.mode != BodyMode::Dynamic {
                    continue;
                }
                if !a.collision.interacts_with(&b.collision) {
                    continue;
                }
                let (Some(ext_a), Some(ext_b)) = (a.aabb_half_extents(), b.aabb_half_extents())
                else {
                    continue;
                };

                let delta = b.position - a.position;
                let overlap = ext_a + ext_b - delta.abs();
                if overlap.x <= 0.0 || overlap.y <= 0.0 {
                    continue;
                }
                overlapping.insert((id_a, id_b));

                if a.sensor || b.sensor {
                    continue;
                }
                // Only dynamic-vs-static pairs are pushed apart
                let (dynamic, other, sign) = match (a.mode, b.mode) {
                    (BodyMode::Dynamic, BodyMode::Dynamic) => continue,
                    (BodyMode::Dynamic, _) => (id_a, id_b, -1.0),
                    _ => (id_b, id_a, 1.0),
                };
                let friction = self.bodies[&other].friction;
                let normal = if overlap.x < overlap.y {
                    Vec2::new(delta.x.signum() * sign, 0.0) * overlap.x
                } else {
                    Vec2::new(0.0, delta.y.signum() * sign) * overlap.y
                };

                if let Some(body) = self.bodies.get_mut(&dynamic) {
                    body.position += normal;
                    let n = normal.normalize_or_zero();
                    let into = body.linvel.dot(n);
                    if into < 0.0 {
                        let tangent = body.linvel - n * into;
                        let keep = (1.0 - friction.max(body.friction)).clamp(0.0, 1.0);
                        body.linvel = tangent * keep - n * into * body.restitution;
                        body.angvel *= keep;
                    }
                }
            }
        }

        for pair in overlapping.difference(&self.touching) {
            self.events.push(ContactEvent::Started(pair.0, pair.1));
        }
        for pair in self.touching.difference(&overlapping) {
            self.events.push(ContactEvent::Ended(pair.0, pair.1));
        }
        self.touching = overlapping;
    }
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new(Vec2::new(0.0, 980.0))
    }
}

impl PhysicsEngine for SandboxWorld {
    fn create_body(&mut self, desc: &BodyDesc) -> BodyId {
        let id = BodyId(self.allocate());
        self.bodies.insert(
            id,
            SandboxBody {
                position: desc.position,
                angle: desc.angle,
                linvel: Vec2::ZERO,
                angvel: 0.0,
                mode: desc.mode,
                shape: desc.shape,
                density: desc.density,
                friction: desc.friction,
                restitution: desc.restitution,
                linear_damping: desc.linear_damping,
                collision: desc.collision,
                sensor: desc.sensor,
            },
        );
        id
    }

    fn destroy_body(&mut self, body: BodyId) {
        if self.bodies.remove(&body).is_none() {
            log::error!("Sandbox: destroy of unknown body {:?}", body);
            return;
        }
        self.constraints
            .retain(|_, c| c.body_a != body && c.body_b != body);
        self.touching.retain(|&(a, b)| a != body && b != body);
    }

    fn create_constraint(&mut self, desc: &ConstraintDesc) -> ConstraintId {
        let id = ConstraintId(self.allocate());
        if !self.bodies.contains_key(&desc.body_a) || !self.bodies.contains_key(&desc.body_b) {
            log::error!(
                "Sandbox: constraint between unknown bodies {:?} / {:?}",
                desc.body_a,
                desc.body_b
            );
        }
        self.constraints.insert(id, *desc);
        id
    }

    fn destroy_constraint(&mut self, constraint: ConstraintId) {
        if self.constraints.remove(&constraint).is_none() {
            log::error!("Sandbox: destroy of unknown constraint {:?}", constraint);
        }
    }

    fn position(&self, body: BodyId) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.position)
    }

    fn angle(&self, body: BodyId) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.angle)
    }

    fn linear_velocity(&self, body: BodyId) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.linvel)
    }

    fn angular_velocity(&self, body: BodyId) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.angvel)
    }

    fn set_position(&mut self, body: BodyId, position: Vec2) {
        if let Some(b) = self.body_mut_or_log(body, "set_position") {
            b.position = position;
        }
    }

    fn set_angle(&mut self, body: BodyId, angle: f32) {
        if let Some(b) = self.body_mut_or_log(body, "set_angle") {
            b.angle = angle;
        }
    }

    fn set_linear_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(b) = self.body_mut_or_log(body, "set_linear_velocity") {
            b.linvel = velocity;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyId, velocity: f32) {
        if let Some(b) = self.body_mut_or_log(body, "set_angular_velocity") {
            b.angvel = velocity;
        }
    }

    fn body_mode(&self, body: BodyId) -> Option<BodyMode> {
        self.bodies.get(&body).map(|b| b.mode)
    }

    fn set_body_mode(&mut self, body: BodyId, mode: BodyMode) {
        if let Some(b) = self.body_mut_or_log(body, "set_body_mode") {
            b.mode = mode;
        }
    }

    fn collision_mask(&self, body: BodyId) -> Option<CollisionMask> {
        self.bodies.get(&body).map(|b| b.collision)
    }

    fn set_collision_mask(&mut self, body: BodyId, mask: CollisionMask) {
        if let Some(b) = self.body_mut_or_log(body, "set_collision_mask") {
            b.collision = mask;
        }
    }

    fn linear_damping(&self, body: BodyId) -> Option<f32> {
        self.bodies.get(&body).map(|b| b.linear_damping)
    }

    fn set_linear_damping(&mut self, body: BodyId, damping: f32) {
        if let Some(b) = self.body_mut_or_log(body, "set_linear_damping") {
            b.linear_damping = damping;
        }
    }

    fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let before: BTreeMap<BodyId, Vec2> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.mode == BodyMode::Dynamic)
            .map(|(id, b)| (*id, b.position))
            .collect();

        self.integrate(dt);
        self.project_constraints();

        // Velocities follow what the projection actually did
        for (id, start) in before {
            if let Some(body) = self.bodies.get_mut(&id) {
                body.linvel = (body.position - start) / dt;
            }
        }
        self.damp_constraints();
        self.resolve_contacts();
    }

    fn drain_contact_events(&mut self) -> Vec<ContactEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn ground(world: &mut SandboxWorld) -> BodyId {
        world.create_body(
            &BodyDesc::new(Vec2::new(400.0, 570.0), BodyMode::Fixed)
                .with_shape(Shape::Rect {
                    half_extents: Vec2::new(400.0, 10.0),
                })
                .with_material(1.0, 0.8, 0.0),
        )
    }

    fn crate_at(world: &mut SandboxWorld, position: Vec2) -> BodyId {
        world.create_body(
            &BodyDesc::new(position, BodyMode::Dynamic)
                .with_shape(Shape::Rect {
                    half_extents: Vec2::splat(4.0),
                })
                .with_collision(CollisionMask::ragdoll()),
        )
    }

    #[test]
    fn test_body_falls_and_lands_on_ground() {
        let mut world = SandboxWorld::default();
        let floor = ground(&mut world);
        let body = crate_at(&mut world, Vec2::new(400.0, 500.0));

        let mut started = Vec::new();
        for _ in 0..240 {
            world.step(DT);
            started.extend(world.drain_contact_events().into_iter().filter(|e| e.is_start()));
        }

        let y = world.position(body).unwrap().y;
        // Rests on the ground top (560) with its half height of 4
        assert!((y - 556.0).abs() < 0.5, "resting y was {}", y);
        assert!(started.contains(&ContactEvent::Started(floor, body)));
    }

    #[test]
    fn test_kinematic_bodies_are_not_integrated() {
        let mut world = SandboxWorld::default();
        let body = crate_at(&mut world, Vec2::new(10.0, 10.0));
        world.set_body_mode(body, BodyMode::Kinematic);
        world.set_linear_velocity(body, Vec2::new(100.0, 0.0));

        world.step(DT);

        assert_eq!(world.position(body), Some(Vec2::new(10.0, 10.0)));
    }

    #[test]
    fn test_spring_pulls_dynamic_body_to_kinematic_anchor() {
        let mut world = SandboxWorld::weightless();
        let anchor = world.create_body(&BodyDesc::new(Vec2::new(100.0, 0.0), BodyMode::Kinematic));
        let body = crate_at(&mut world, Vec2::ZERO);
        world.create_constraint(&ConstraintDesc {
            body_a: body,
            body_b: anchor,
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
            stiffness: 0.5,
            damping: 0.1,
            rest_length: 0.0,
        });

        for _ in 0..30 {
            world.step(DT);
        }

        let distance = world.position(body).unwrap().distance(Vec2::new(100.0, 0.0));
        assert!(distance < 1.0, "still {} away", distance);
        // The anchor itself never moves
        assert_eq!(world.position(anchor), Some(Vec2::new(100.0, 0.0)));
    }

    #[test]
    fn test_disabled_mask_suppresses_contacts() {
        let mut world = SandboxWorld::default();
        ground(&mut world);
        let body = crate_at(&mut world, Vec2::new(400.0, 556.0));
        world.set_collision_mask(body, CollisionMask::ragdoll().disabled());

        world.step(DT);

        assert!(world.drain_contact_events().is_empty());
        assert!(world.position(body).unwrap().y > 556.0);
    }

    #[test]
    fn test_destroy_body_removes_its_constraints() {
        let mut world = SandboxWorld::weightless();
        let a = crate_at(&mut world, Vec2::ZERO);
        let b = crate_at(&mut world, Vec2::new(5.0, 0.0));
        world.create_constraint(&ConstraintDesc {
            body_a: a,
            body_b: b,
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
            stiffness: 1.0,
            damping: 0.0,
            rest_length: 5.0,
        });
        assert_eq!(world.constraint_count(), 1);

        world.destroy_body(b);

        assert_eq!(world.constraint_count(), 0);
        assert_eq!(world.body_count(), 1);
        assert_eq!(world.position(b), None);
    }

    #[test]
    fn test_injected_contacts_are_drained_once() {
        let mut world = SandboxWorld::weightless();
        world.inject_contact(ContactEvent::Started(BodyId(1), BodyId(2)));

        assert_eq!(world.drain_contact_events().len(), 1);
        assert!(world.drain_contact_events().is_empty());
    }
}
