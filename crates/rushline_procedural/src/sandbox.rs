//! # Sandbox Host
//!
//! In-memory [`TrackHost`] for tests, benches and the headless soak run.
//!
//! Every registered template owns one box collider in its local frame. A
//! posed, active instance contributes the world-space AABB of that box to
//! spatial queries. Inactive instances are invisible to queries.

use std::collections::HashMap;

use rushline_core::TemplateId;
use rushline_shared::{Pose, Vec3};

use crate::config::{HazardKind, TrackConfig};
use crate::host::{Extents, InstanceFactory, InstanceId, LayerMask, SpatialQuery};

// ============================================================================
// AABB (Axis-Aligned Bounding Box)
// ============================================================================

/// Axis-aligned box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Box from centre and half extents.
    #[must_use]
    pub fn from_center(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Squared distance from `p` to the box (zero inside).
    #[must_use]
    pub fn distance_squared_to(&self, p: Vec3) -> f32 {
        let clamped = p.max(self.min).min(self.max);
        clamped.distance_squared(p)
    }

    /// Does the sphere strictly intersect the box?
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.distance_squared_to(center) < radius * radius
    }

    /// Is `(x, z)` strictly inside the box footprint?
    #[must_use]
    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x > self.min.x && x < self.max.x && z > self.min.z && z < self.max.z
    }
}

// ============================================================================
// TEMPLATES & INSTANCES
// ============================================================================

/// Collider of a template in its local frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemplateShape {
    /// Layer of the collider.
    pub layer: LayerMask,
    /// Local centre of the box.
    pub center: Vec3,
    /// Half extents of the box.
    pub half: Vec3,
}

impl TemplateShape {
    /// Box resting on the local origin: spans `y = 0..height`, centred in X/Z.
    #[must_use]
    pub fn resting(layer: LayerMask, length: f32, half_width: f32, height: f32) -> Self {
        Self {
            layer,
            center: Vec3::new(0.0, height * 0.5, 0.0),
            half: Vec3::new(half_width, height * 0.5, length * 0.5),
        }
    }

    /// Road slab whose top is at `top` and which runs along local `z = 0..length`.
    #[must_use]
    pub fn road(length: f32, half_width: f32, top: f32) -> Self {
        const THICKNESS: f32 = 0.5;
        Self {
            layer: LayerMask::GROUND,
            center: Vec3::new(0.0, top - THICKNESS * 0.5, length * 0.5),
            half: Vec3::new(half_width, THICKNESS * 0.5, length * 0.5),
        }
    }

    fn extents(&self) -> Extents {
        Extents {
            length: self.half.z * 2.0,
            half_width: self.half.x,
            height: self.half.y * 2.0,
        }
    }
}

/// One sandbox instance.
#[derive(Clone, Copy, Debug)]
pub struct SandboxInstance {
    /// Template it was built from.
    pub template: TemplateId,
    /// World pose.
    pub pose: Pose,
    /// Participates in queries when `true`.
    pub active: bool,
    /// Flagged kinematic by the generator.
    pub kinematic: bool,
    /// Scene parent.
    pub parent: Option<InstanceId>,
}

/// In-memory scene.
#[derive(Debug, Default)]
pub struct SandboxHost {
    shapes: HashMap<TemplateId, TemplateShape>,
    instances: HashMap<InstanceId, SandboxInstance>,
    next_id: u64,
    instantiated: u64,
    destroyed: u64,
}

impl SandboxHost {
    /// Empty scene with no templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene with a default collider for every template the config names.
    #[must_use]
    pub fn for_config(config: &TrackConfig) -> Self {
        let mut host = Self::new();

        let widest = config
            .lanes_local_x
            .iter()
            .fold(0.0_f32, |acc, x| acc.max(x.abs()));
        for variant in &config.variants {
            let Some(template) = &variant.template else {
                continue;
            };
            let lane_reach = variant
                .shape
                .lanes
                .as_ref()
                .map_or(widest, |lanes| lanes.iter().fold(0.0_f32, |acc, l| acc.max(l.x.abs())));
            host.register(
                template,
                TemplateShape::road(variant.shape.length, lane_reach + 1.5, variant.shape.base_height),
            );
        }

        for hazard in &config.placement.hazards {
            let shape = match hazard.kind {
                HazardKind::Obstacle => TemplateShape::resting(LayerMask::SOLID, 1.5, 0.7, 1.2),
                HazardKind::Train => TemplateShape::resting(LayerMask::SOLID, 12.0, 0.9, 3.0),
            };
            host.register(&hazard.template, shape);
        }

        host.register(
            &config.coins.template,
            TemplateShape::resting(LayerMask::PICKUP, 0.2, config.coins.coin_radius, config.coins.coin_radius * 2.0),
        );
        for kind in &config.powerups.kinds {
            host.register(&kind.template, TemplateShape::resting(LayerMask::PICKUP, 0.8, 0.4, 0.8));
        }
        host
    }

    /// Registers (or replaces) the collider of a template.
    pub fn register(&mut self, template: &str, shape: TemplateShape) {
        self.shapes.insert(TemplateId::from_name(template), shape);
    }

    /// Spawns an active, posed instance outside any pool.
    ///
    /// Returns `None` if the template is unknown.
    pub fn spawn_static(&mut self, template: &str, pose: Pose) -> Option<InstanceId> {
        let id = self.instantiate(TemplateId::from_name(template))?;
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.pose = pose;
            instance.active = true;
        }
        Some(id)
    }

    /// Instance by id.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&SandboxInstance> {
        self.instances.get(&id)
    }

    /// Existing instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Active instances.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.instances.values().filter(|i| i.active).count()
    }

    /// Active instances of one template.
    #[must_use]
    pub fn active_of(&self, template: &str) -> usize {
        let id = TemplateId::from_name(template);
        self.instances.values().filter(|i| i.active && i.template == id).count()
    }

    /// Total instantiations so far.
    #[must_use]
    pub const fn instantiated(&self) -> u64 {
        self.instantiated
    }

    /// Total destructions so far.
    #[must_use]
    pub const fn destroyed(&self) -> u64 {
        self.destroyed
    }

    /// World AABB of an instance.
    #[must_use]
    pub fn world_aabb(&self, id: InstanceId) -> Option<Aabb> {
        let instance = self.instances.get(&id)?;
        let shape = self.shapes.get(&instance.template)?;
        Some(Self::bounds(instance, shape))
    }

    fn bounds(instance: &SandboxInstance, shape: &TemplateShape) -> Aabb {
        let rotation = instance.pose.rotation;
        let ax = rotation.rotate(Vec3::X) * shape.half.x;
        let ay = rotation.rotate(Vec3::Y) * shape.half.y;
        let az = rotation.rotate(Vec3::Z) * shape.half.z;
        let half = Vec3::new(
            ax.x.abs() + ay.x.abs() + az.x.abs(),
            ax.y.abs() + ay.y.abs() + az.y.abs(),
            ax.z.abs() + ay.z.abs() + az.z.abs(),
        );
        Aabb::from_center(instance.pose.transform_point(shape.center), half)
    }

    fn colliders(&self, mask: LayerMask) -> impl Iterator<Item = Aabb> + '_ {
        self.instances.values().filter(|i| i.active).filter_map(move |i| {
            let shape = self.shapes.get(&i.template)?;
            shape.layer.intersects(mask).then(|| Self::bounds(i, shape))
        })
    }
}

impl SpatialQuery for SandboxHost {
    fn sphere_overlap(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool {
        self.colliders(mask).any(|b| b.intersects_sphere(center, radius))
    }

    fn capsule_overlap(&self, a: Vec3, b: Vec3, radius: f32, mask: LayerMask) -> bool {
        // sampled sweep, step no longer than half the radius
        let span = a.distance(b);
        let steps = ((span / (radius * 0.5).max(0.01)).ceil() as usize).max(1);
        self.colliders(mask).any(|aabb| {
            (0..=steps).any(|i| aabb.intersects_sphere(a.lerp(b, i as f32 / steps as f32), radius))
        })
    }

    fn raycast_down(&self, origin: Vec3, max_distance: f32, mask: LayerMask) -> Option<Vec3> {
        self.colliders(mask)
            .filter(|b| b.contains_xz(origin.x, origin.z))
            .map(|b| b.max.y)
            .filter(|&top| top <= origin.y && origin.y - top <= max_distance)
            .fold(None, |best: Option<f32>, top| Some(best.map_or(top, |b| b.max(top))))
            .map(|y| Vec3::new(origin.x, y, origin.z))
    }
}

impl InstanceFactory for SandboxHost {
    fn instantiate(&mut self, template: TemplateId) -> Option<InstanceId> {
        if !self.shapes.contains_key(&template) {
            return None;
        }
        self.next_id += 1;
        let id = InstanceId(self.next_id);
        self.instances.insert(
            id,
            SandboxInstance {
                template,
                pose: Pose::IDENTITY,
                active: true,
                kinematic: false,
                parent: None,
            },
        );
        self.instantiated += 1;
        Some(id)
    }

    fn destroy(&mut self, instance: InstanceId) {
        if self.instances.remove(&instance).is_some() {
            self.destroyed += 1;
        }
    }

    fn set_active(&mut self, instance: InstanceId, active: bool) {
        if let Some(i) = self.instances.get_mut(&instance) {
            i.active = active;
        }
    }

    fn set_pose(&mut self, instance: InstanceId, pose: Pose, parent: Option<InstanceId>) {
        if let Some(i) = self.instances.get_mut(&instance) {
            i.pose = pose;
            i.parent = parent;
        }
    }

    fn set_kinematic(&mut self, instance: InstanceId, kinematic: bool) {
        if let Some(i) = self.instances.get_mut(&instance) {
            i.kinematic = kinematic;
        }
    }

    fn measure(&self, template: TemplateId) -> Option<Extents> {
        self.shapes.get(&template).map(TemplateShape::extents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> SandboxHost {
        let mut host = SandboxHost::new();
        host.register("crate", TemplateShape::resting(LayerMask::SOLID, 2.0, 0.5, 1.0));
        host.register("road", TemplateShape::road(30.0, 4.0, 0.0));
        host
    }

    #[test]
    fn test_sphere_overlap_respects_mask_and_activity() {
        let mut host = host();
        let id = host.spawn_static("crate", Pose::from_position(Vec3::new(0.0, 0.0, 10.0))).unwrap();

        let probe = Vec3::new(0.0, 0.5, 10.0);
        assert!(host.sphere_overlap(probe, 0.1, LayerMask::SOLID));
        assert!(!host.sphere_overlap(probe, 0.1, LayerMask::GROUND));

        host.set_active(id, false);
        assert!(!host.sphere_overlap(probe, 0.1, LayerMask::SOLID));
    }

    #[test]
    fn test_touching_is_not_overlap() {
        let mut host = host();
        host.spawn_static("crate", Pose::IDENTITY).unwrap();
        // box spans x in [-0.5, 0.5]
        assert!(!host.sphere_overlap(Vec3::new(1.0, 0.5, 0.0), 0.5, LayerMask::SOLID));
        assert!(host.sphere_overlap(Vec3::new(0.99, 0.5, 0.0), 0.5, LayerMask::SOLID));
    }

    #[test]
    fn test_capsule_sweep_hits_box_between_ends() {
        let mut host = host();
        host.spawn_static("crate", Pose::from_position(Vec3::new(0.0, 0.0, 5.0))).unwrap();
        let a = Vec3::new(0.0, 0.5, 0.0);
        let b = Vec3::new(0.0, 0.5, 10.0);
        assert!(host.capsule_overlap(a, b, 0.2, LayerMask::SOLID));
        assert!(!host.capsule_overlap(a + Vec3::X * 3.0, b + Vec3::X * 3.0, 0.2, LayerMask::SOLID));
    }

    #[test]
    fn test_raycast_hits_road_top() {
        let mut host = host();
        host.spawn_static("road", Pose::from_position(Vec3::new(0.0, 2.0, 0.0))).unwrap();
        let hit = host.raycast_down(Vec3::new(1.0, 5.0, 12.0), 10.0, LayerMask::GROUND).unwrap();
        assert!((hit.y - 2.0).abs() < 1e-4);
        assert!(host.raycast_down(Vec3::new(1.0, 5.0, 40.0), 10.0, LayerMask::GROUND).is_none());
        assert!(host.raycast_down(Vec3::new(1.0, 5.0, 12.0), 1.0, LayerMask::GROUND).is_none());
    }

    #[test]
    fn test_yawed_instance_swaps_extents() {
        let mut host = host();
        let pose = Pose::new(Vec3::ZERO, rushline_shared::Quat::from_yaw_degrees(90.0));
        let id = host.spawn_static("crate", pose).unwrap();
        let aabb = host.world_aabb(id).unwrap();
        assert!((aabb.max.x - 1.0).abs() < 1e-4);
        assert!((aabb.max.z - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_template_is_not_built() {
        let mut host = host();
        assert!(host.instantiate(TemplateId::from_name("ghost")).is_none());
        assert!(host.measure(TemplateId::from_name("ghost")).is_none());
        assert_eq!(host.measure(TemplateId::from_name("crate")).unwrap().length, 2.0);
    }
}
