use glam::DVec3;

use crate::utils::{
    allocator::EntityId,
    bounds::{Bounds, Ray},
    fixed::Position,
};

use super::{
    physical::PhysicalId,
    shape::Shape,
    types::{GlobalCFrame, MassProperties, PartProperties},
};

pub type PartId = EntityId;

/// A single collision shape placed in the world.
///
/// Parts are created by the application and handed to the world, which
/// gives each one an owning physical. The placement is driven by that
/// physical once the part is in a world.
#[derive(Debug, Clone)]
pub struct Part {
    pub id: PartId,
    pub shape: Shape,
    pub properties: PartProperties,
    pub(crate) cframe: GlobalCFrame,
    pub(crate) physical: Option<PhysicalId>,
    pub(crate) is_terrain: bool,
}

impl Part {
    pub fn new(shape: Shape, cframe: GlobalCFrame, properties: PartProperties) -> Self {
        Self {
            id: PartId::default(),
            shape,
            properties,
            cframe,
            physical: None,
            is_terrain: false,
        }
    }

    pub fn cframe(&self) -> &GlobalCFrame {
        &self.cframe
    }

    pub fn position(&self) -> Position {
        self.cframe.position
    }

    pub fn physical(&self) -> Option<PhysicalId> {
        self.physical
    }

    pub fn is_terrain(&self) -> bool {
        self.is_terrain
    }

    pub fn mass(&self) -> f64 {
        self.shape.volume() * self.properties.density
    }

    pub fn max_radius(&self) -> f64 {
        self.shape.max_radius()
    }

    /// Mass properties in the part's own frame.
    pub fn local_mass_properties(&self) -> MassProperties {
        MassProperties {
            mass: self.mass(),
            center_of_mass: self.shape.center_of_mass(),
            inertia: self.shape.inertia(self.properties.density),
        }
    }

    pub fn center_of_mass(&self) -> Position {
        self.cframe.local_to_global(self.shape.center_of_mass())
    }

    pub fn bounds(&self) -> Bounds {
        self.shape.bounds(&self.cframe)
    }

    /// World-space surface velocity contributed by the conveyor effect.
    pub fn conveyor_velocity(&self) -> DVec3 {
        self.cframe.local_to_relative(self.properties.conveyor_effect)
    }

    /// Ray parameter of the first hit, `None` when the ray misses.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f64> {
        let origin = self.cframe.global_to_local(ray.origin);
        let direction = self.cframe.relative_to_local(ray.direction);
        self.shape.intersect_ray(origin, direction)
    }

    pub fn contains_point(&self, point: Position) -> bool {
        self.shape.contains_point(self.cframe.global_to_local(point))
    }
}
