use cgmath::{Vector3, Zero};

use crate::data_structures::behaviour::{Behaviour, EntityBehaviour};

pub type EntityId = u32;

/// Id of the always-present, never visible root entity.
pub const ROOT_ID: EntityId = 0;

/// Slot used when an entity has no explicit texture reference.
pub const DEFAULT_TEXREF: &str = "default";

/// A placed object in the scene graph.
///
/// `position` is absolute. Once the entity has a parent, `local` is the
/// authoritative placement and `position` is recomputed from it every update.
/// Parent and children are ids into the owning [`Registry`](super::scene_graph::Registry).
#[derive(Clone, Debug)]
pub struct Entity {
    pub(crate) id: EntityId,
    pub name: String,
    pub class: String,
    pub subclass: String,
    pub position: Vector3<f32>,
    pub local: Vector3<f32>,
    pub invis: bool,
    pub(crate) texref: String,
    pub(crate) texture: String,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub behaviour: Behaviour,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        name: &str,
        class: &str,
        subclass: &str,
        position: Vector3<f32>,
        behaviour: Behaviour,
    ) -> Self {
        let invis = behaviour.is_marker();
        Self {
            id,
            name: name.to_string(),
            class: class.to_string(),
            subclass: subclass.to_string(),
            position,
            local: Vector3::zero(),
            invis,
            texref: DEFAULT_TEXREF.to_string(),
            texture: String::new(),
            parent: None,
            children: Vec::new(),
            behaviour,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn texref(&self) -> &str {
        &self.texref
    }

    /// Resolved texture path, empty until a prototype slot matched.
    pub fn texture(&self) -> &str {
        &self.texture
    }

    /// `class` or `class.subclass`, the form used in scene files.
    pub fn qualified_class(&self) -> String {
        if self.subclass.is_empty() {
            self.class.clone()
        } else {
            format!("{}.{}", self.class, self.subclass)
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "#{} '{}' {} pos=({}, {}, {}) local=({}, {}, {}){} [{}]",
            self.id,
            self.name,
            self.qualified_class(),
            self.position.x,
            self.position.y,
            self.position.z,
            self.local.x,
            self.local.y,
            self.local.z,
            if self.invis { " invis" } else { "" },
            self.behaviour.describe()
        )
    }
}
