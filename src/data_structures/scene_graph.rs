//! Scene graph registry.
//!
//! The [`Registry`] is the sole owner of every live [`Entity`]. Entities are
//! stored densely and addressed by integer id; parent and child links are ids
//! as well, so removing entities never leaves dangling references behind.
//!
//! Entity `0` is the root. It always exists, is never drawn and is the
//! default parent of everything that gets instantiated.

use std::collections::{HashMap, HashSet};

use cgmath::{Vector3, Zero};

use crate::data_structures::{
    behaviour::{Behaviour, BehaviourTable, EntityBehaviour, SceneInfo},
    entity::{Entity, EntityId, ROOT_ID},
    prototype::PrototypeTable,
};

#[derive(Debug)]
pub struct Registry {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    next_id: EntityId,
    prototypes: PrototypeTable,
    behaviours: BehaviourTable,
    active_camera: Option<EntityId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(PrototypeTable::default(), BehaviourTable::core())
    }
}

impl Registry {
    pub fn new(prototypes: PrototypeTable, behaviours: BehaviourTable) -> Self {
        let mut root = Entity::new(
            ROOT_ID,
            "root",
            "root",
            "",
            Vector3::zero(),
            Behaviour::Scene(SceneInfo {
                name: "root".to_string(),
                source: None,
            }),
        );
        root.invis = true;
        root.texref.clear();
        let mut index = HashMap::new();
        index.insert(ROOT_ID, 0);
        Self {
            entities: vec![root],
            index,
            next_id: ROOT_ID + 1,
            prototypes,
            behaviours,
            active_camera: None,
        }
    }

    pub fn root(&self) -> EntityId {
        ROOT_ID
    }

    pub fn prototypes(&self) -> &PrototypeTable {
        &self.prototypes
    }

    pub fn prototypes_mut(&mut self) -> &mut PrototypeTable {
        &mut self.prototypes
    }

    pub fn behaviours_mut(&mut self) -> &mut BehaviourTable {
        &mut self.behaviours
    }

    /// Number of live entities, root included.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Consistent with [`len`](Self::len): the root always exists, so a
    /// registry is never empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index.get(&id).map(|&i| &mut self.entities[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|e| e.id != ROOT_ID && e.name == name)
            .map(|e| e.id)
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.get(id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.get(id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Create an entity from its class and prototype and attach it under the
    /// root. Returns `None` when no behaviour is registered for the class.
    pub fn instantiate(
        &mut self,
        class: &str,
        subclass: &str,
        name: &str,
        position: Vector3<f32>,
    ) -> Option<EntityId> {
        let Some(kind) = self.behaviours.lookup(class, subclass) else {
            log::warn!(
                "Cannot instantiate '{}': no behaviour registered for class {}:{}",
                name,
                class,
                subclass
            );
            return None;
        };
        let mut behaviour = kind.instantiate();
        if let Some(prototype) = self.prototypes.get(class, subclass) {
            for (key, value) in prototype.properties.iter() {
                if !behaviour.apply_property(key, value) {
                    log::debug!(
                        "Prototype {}:{} property '{}' not applicable, ignored",
                        class,
                        subclass,
                        key
                    );
                }
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let entity = Entity::new(id, name, class, subclass, position, behaviour);
        self.index.insert(id, self.entities.len());
        self.entities.push(entity);

        self.resolve_texture(id);
        self.add_child(ROOT_ID, id);
        Some(id)
    }

    fn is_ancestor(&self, candidate: EntityId, of: EntityId) -> bool {
        let mut current = self.parent(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Reparent `child` under `parent`, keeping its absolute position. The
    /// local offset is recomputed from the current absolute positions.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if child == ROOT_ID || parent == child {
            log::warn!("Refusing to attach entity {} under {}", child, parent);
            return false;
        }
        let (Some(&parent_idx), Some(&child_idx)) =
            (self.index.get(&parent), self.index.get(&child))
        else {
            log::warn!("add_child: unknown entity {} or {}", parent, child);
            return false;
        };
        if self.is_ancestor(child, parent) {
            log::warn!(
                "Refusing to attach entity {} under its own descendant {}",
                child,
                parent
            );
            return false;
        }

        self.detach(child);
        let parent_pos = self.entities[parent_idx].position;
        let entity = &mut self.entities[child_idx];
        entity.local = entity.position - parent_pos;
        entity.parent = Some(parent);
        self.entities[parent_idx].children.push(child);
        true
    }

    /// Detach `child` from `parent` without destroying it. The local offset
    /// is zeroed and the entity keeps its last absolute position.
    pub fn remove_child(&mut self, parent: EntityId, child: EntityId) -> bool {
        if self.parent(child) != Some(parent) {
            return false;
        }
        self.detach(child);
        if let Some(entity) = self.get_mut(child) {
            entity.local = Vector3::zero();
        }
        true
    }

    fn detach(&mut self, child: EntityId) {
        let Some(old_parent) = self.parent(child) else {
            return;
        };
        if let Some(parent) = self.get_mut(old_parent) {
            parent.children.retain(|&c| c != child);
        }
        if let Some(entity) = self.get_mut(child) {
            entity.parent = None;
        }
    }

    /// Erase every listed entity. The root is never removed. Surviving
    /// children of removed entities become parentless and keep their
    /// absolute position. Returns how many entities were removed.
    pub fn remove_by_ids(&mut self, ids: &[EntityId]) -> usize {
        let doomed: HashSet<EntityId> = ids.iter().copied().filter(|&id| id != ROOT_ID).collect();
        if doomed.is_empty() {
            return 0;
        }
        let before = self.entities.len();
        self.entities.retain(|e| !doomed.contains(&e.id));
        let removed = before - self.entities.len();

        for entity in self.entities.iter_mut() {
            entity.children.retain(|c| !doomed.contains(c));
            if entity.parent.is_some_and(|p| doomed.contains(&p)) {
                entity.parent = None;
                entity.local = Vector3::zero();
            }
        }
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
        if self.active_camera.is_some_and(|c| doomed.contains(&c)) {
            self.active_camera = None;
        }
        removed
    }

    /// Look up the entity's texture path from its prototype using the
    /// current texref. On failure the previous texture is kept.
    pub fn resolve_texture(&mut self, id: EntityId) -> bool {
        let Some(&idx) = self.index.get(&id) else {
            return false;
        };
        let entity = &self.entities[idx];
        // text is drawn from glyphs, never from a prototype texture
        if id == ROOT_ID || entity.invis || matches!(entity.behaviour, Behaviour::UiText(_)) {
            return false;
        }
        let resolved = self
            .prototypes
            .get(&entity.class, &entity.subclass)
            .and_then(|p| p.textures.resolve(&entity.texref))
            .map(str::to_string);
        match resolved {
            Some(path) => {
                self.entities[idx].texture = path;
                true
            }
            None => {
                log::warn!(
                    "No texture for {}:{} with texref '{}'",
                    entity.class,
                    entity.subclass,
                    entity.texref
                );
                false
            }
        }
    }

    /// Switch the texture slot and re-resolve.
    pub fn set_tex_ref(&mut self, id: EntityId, texref: &str) -> bool {
        match self.get_mut(id) {
            Some(entity) => entity.texref = texref.to_string(),
            None => return false,
        }
        self.resolve_texture(id)
    }

    /// Point the entity at an explicit texture path, bypassing prototypes.
    pub fn set_texture_path(&mut self, id: EntityId, path: &str) -> bool {
        match self.get_mut(id) {
            Some(entity) if id != ROOT_ID => {
                entity.texture = path.to_string();
                entity.texref = path.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn set_active_camera(&mut self, id: EntityId) -> bool {
        match self.get(id) {
            Some(entity) if entity.behaviour == Behaviour::Camera => {
                self.active_camera = Some(id);
                true
            }
            _ => {
                log::warn!("Entity {} is not a camera", id);
                false
            }
        }
    }

    pub fn active_camera(&self) -> Option<EntityId> {
        self.active_camera
    }

    /// World offset of the active camera, the origin when there is none.
    pub fn camera_offset(&self) -> Vector3<f32> {
        self.active_camera
            .and_then(|id| self.get(id))
            .map(|camera| camera.position)
            .unwrap_or_else(Vector3::zero)
    }

    /// Tick every behaviour, then propagate placement down the tree so that
    /// `position == parent.position + local` holds for every parented entity.
    pub fn update(&mut self) {
        for entity in self.entities.iter_mut() {
            let delta = entity.behaviour.tick();
            if delta.is_zero() {
                continue;
            }
            if entity.parent.is_some() {
                entity.local += delta;
            } else {
                entity.position += delta;
            }
        }

        let mut stack: Vec<usize> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(i, _)| i)
            .collect();
        while let Some(i) = stack.pop() {
            let base = self.entities[i].position;
            for c in 0..self.entities[i].children.len() {
                let child_id = self.entities[i].children[c];
                if let Some(&ci) = self.index.get(&child_id) {
                    let child = &mut self.entities[ci];
                    child.position = base + child.local;
                    stack.push(ci);
                }
            }
        }
    }

    pub fn describe(&self, id: EntityId) -> Option<String> {
        self.get(id).map(Entity::describe)
    }

    /// Indented dump of the subtree below `id`.
    pub fn tree_string(&self, id: EntityId) -> String {
        let mut out = String::new();
        self.write_tree(id, 0, &mut out);
        out
    }

    fn write_tree(&self, id: EntityId, depth: usize, out: &mut String) {
        let Some(entity) = self.get(id) else {
            return;
        };
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!(
            "{} [{}] #{} ({}, {}, {})\n",
            if entity.name.is_empty() { "-" } else { entity.name.as_str() },
            entity.qualified_class(),
            entity.id,
            entity.position.x,
            entity.position.y,
            entity.position.z
        ));
        for &child in &entity.children {
            self.write_tree(child, depth + 1, out);
        }
    }
}
