//! Entity behaviours and the class lookup table.
//!
//! Every entity carries exactly one [`Behaviour`] variant. The variant is
//! chosen at instantiation time through a [`BehaviourTable`], which is keyed
//! by class with an optional `(class, subclass)` override. Variants expose a
//! small typed property schema: [`EntityBehaviour::apply_property`] matches
//! known keys and ignores the rest.
//!
//! # Key types
//!
//! - [`Behaviour`] is the closed set of runtime behaviours
//! - [`BehaviourKind`] is the constructor tag stored in the table
//! - [`BehaviourTable`] resolves a class/subclass pair to a kind

use std::collections::HashMap;

use cgmath::{Vector3, Zero};
use serde_json::Value;

/// Capability interface shared by all behaviour variants.
pub trait EntityBehaviour {
    /// Advance one simulation step. Returns the displacement to apply to the
    /// owning entity (its local offset when parented, else its position).
    fn tick(&mut self) -> Vector3<f32>;

    /// Short human readable summary of the behaviour state.
    fn describe(&self) -> String;

    /// Apply one named property. Returns `false` when the key is not part of
    /// the variant's schema or the value has the wrong type.
    fn apply_property(&mut self, key: &str, value: &Value) -> bool;
}

/// Plain drawable world object. Drifts by `velocity` each tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Sprite {
    pub velocity: Vector3<f32>,
}

impl Default for Sprite {
    fn default() -> Self {
        Self {
            velocity: Vector3::zero(),
        }
    }
}

/// Grouping entity created for every loaded scene file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneInfo {
    pub name: String,
    /// File the scene was loaded from. `None` for scenes built in code.
    pub source: Option<String>,
}

/// Screen-space image. Placement precedence lives in the GUI layer.
#[derive(Clone, Debug, PartialEq)]
pub struct UiImage {
    pub nx: f32,
    pub ny: f32,
    pub sx: f32,
    pub sy: f32,
    pub w: f32,
    pub h: f32,
}

impl Default for UiImage {
    fn default() -> Self {
        Self {
            nx: -1.0,
            ny: -1.0,
            sx: 0.0,
            sy: 0.0,
            w: 0.0,
            h: 0.0,
        }
    }
}

/// Screen-space text run.
#[derive(Clone, Debug, PartialEq)]
pub struct UiText {
    pub text: String,
    /// Font path; empty means the layer's default font.
    pub font: String,
    pub size: u32,
    pub nx: f32,
    pub ny: f32,
    pub sx: f32,
    pub sy: f32,
    /// Stored for games to read back; the vertex format carries no colour.
    pub colour: [f32; 4],
}

impl Default for UiText {
    fn default() -> Self {
        Self {
            text: String::new(),
            font: String::new(),
            size: 24,
            nx: -1.0,
            ny: -1.0,
            sx: 0.0,
            sy: 0.0,
            colour: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Behaviour {
    Sprite(Sprite),
    Camera,
    Scene(SceneInfo),
    UiImage(UiImage),
    UiText(UiText),
}

impl Behaviour {
    /// Scene and camera markers are never drawn.
    pub fn is_marker(&self) -> bool {
        matches!(self, Behaviour::Camera | Behaviour::Scene(_))
    }

    pub fn scene(&self) -> Option<&SceneInfo> {
        match self {
            Behaviour::Scene(info) => Some(info),
            _ => None,
        }
    }
}

impl EntityBehaviour for Behaviour {
    fn tick(&mut self) -> Vector3<f32> {
        match self {
            Behaviour::Sprite(sprite) => sprite.velocity,
            _ => Vector3::zero(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Behaviour::Sprite(s) => format!(
                "sprite v=({}, {}, {})",
                s.velocity.x, s.velocity.y, s.velocity.z
            ),
            Behaviour::Camera => "camera".to_string(),
            Behaviour::Scene(info) => match &info.source {
                Some(src) => format!("scene '{}' from {}", info.name, src),
                None => format!("scene '{}'", info.name),
            },
            Behaviour::UiImage(ui) => format!(
                "ui image n=({}, {}) s=({}, {}) size={}x{}",
                ui.nx, ui.ny, ui.sx, ui.sy, ui.w, ui.h
            ),
            Behaviour::UiText(t) => format!("ui text '{}' {}px", t.text, t.size),
        }
    }

    fn apply_property(&mut self, key: &str, value: &Value) -> bool {
        match self {
            Behaviour::Sprite(sprite) => match key {
                "vx" => set_f32(&mut sprite.velocity.x, value),
                "vy" => set_f32(&mut sprite.velocity.y, value),
                "vz" => set_f32(&mut sprite.velocity.z, value),
                _ => false,
            },
            Behaviour::UiImage(ui) => match key {
                "nx" => set_f32(&mut ui.nx, value),
                "ny" => set_f32(&mut ui.ny, value),
                "sx" => set_f32(&mut ui.sx, value),
                "sy" => set_f32(&mut ui.sy, value),
                "w" => set_f32(&mut ui.w, value),
                "h" => set_f32(&mut ui.h, value),
                _ => false,
            },
            Behaviour::UiText(t) => match key {
                "text" => set_string(&mut t.text, value),
                "font" => set_string(&mut t.font, value),
                "size" => match as_f32(value) {
                    Some(size) if size >= 1.0 => {
                        t.size = size as u32;
                        true
                    }
                    _ => false,
                },
                "nx" => set_f32(&mut t.nx, value),
                "ny" => set_f32(&mut t.ny, value),
                "sx" => set_f32(&mut t.sx, value),
                "sy" => set_f32(&mut t.sy, value),
                "r" => set_f32(&mut t.colour[0], value),
                "g" => set_f32(&mut t.colour[1], value),
                "b" => set_f32(&mut t.colour[2], value),
                "a" => set_f32(&mut t.colour[3], value),
                _ => false,
            },
            Behaviour::Camera | Behaviour::Scene(_) => false,
        }
    }
}

/// Numbers are taken as is; numeric strings are parsed.
fn as_f32(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn set_f32(slot: &mut f32, value: &Value) -> bool {
    match as_f32(value) {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

fn set_string(slot: &mut String, value: &Value) -> bool {
    match value {
        Value::String(s) => {
            *slot = s.clone();
            true
        }
        Value::Number(n) => {
            *slot = n.to_string();
            true
        }
        _ => false,
    }
}

/// Constructor tag for a [`Behaviour`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BehaviourKind {
    Sprite,
    Camera,
    Scene,
    UiImage,
    UiText,
}

impl BehaviourKind {
    pub fn instantiate(self) -> Behaviour {
        match self {
            BehaviourKind::Sprite => Behaviour::Sprite(Sprite::default()),
            BehaviourKind::Camera => Behaviour::Camera,
            BehaviourKind::Scene => Behaviour::Scene(SceneInfo::default()),
            BehaviourKind::UiImage => Behaviour::UiImage(UiImage::default()),
            BehaviourKind::UiText => Behaviour::UiText(UiText::default()),
        }
    }
}

/// Two-level class lookup: `(class, subclass)` overrides win over `class`.
#[derive(Clone, Debug, Default)]
pub struct BehaviourTable {
    by_class: HashMap<String, BehaviourKind>,
    by_subclass: HashMap<(String, String), BehaviourKind>,
}

impl BehaviourTable {
    /// Table with the engine's built-in classes registered.
    pub fn core() -> Self {
        let mut table = Self::default();
        table.register("scene", BehaviourKind::Scene);
        table.register("camera", BehaviourKind::Camera);
        table.register("tile", BehaviourKind::Sprite);
        table.register("ui", BehaviourKind::UiImage);
        table.register_subclass("ui", "text", BehaviourKind::UiText);
        table
    }

    pub fn register(&mut self, class: &str, kind: BehaviourKind) {
        self.by_class.insert(class.to_string(), kind);
    }

    pub fn register_subclass(&mut self, class: &str, subclass: &str, kind: BehaviourKind) {
        self.by_subclass
            .insert((class.to_string(), subclass.to_string()), kind);
    }

    pub fn lookup(&self, class: &str, subclass: &str) -> Option<BehaviourKind> {
        if !subclass.is_empty() {
            if let Some(kind) = self
                .by_subclass
                .get(&(class.to_string(), subclass.to_string()))
            {
                return Some(*kind);
            }
        }
        self.by_class.get(class).copied()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn subclass_override_wins() {
        let table = BehaviourTable::core();
        assert_eq!(table.lookup("ui", "text"), Some(BehaviourKind::UiText));
        assert_eq!(table.lookup("ui", "button"), Some(BehaviourKind::UiImage));
        assert_eq!(table.lookup("tile", "grass"), Some(BehaviourKind::Sprite));
        assert_eq!(table.lookup("dragon", ""), None);
    }

    #[test]
    fn unknown_and_mistyped_properties_are_ignored() {
        let mut text = BehaviourKind::UiText.instantiate();
        assert!(text.apply_property("text", &json!("score")));
        assert!(text.apply_property("size", &json!(32)));
        assert!(!text.apply_property("size", &json!([1, 2])));
        assert!(!text.apply_property("wobble", &json!(1)));
        match text {
            Behaviour::UiText(t) => {
                assert_eq!(t.text, "score");
                assert_eq!(t.size, 32);
            }
            other => panic!("unexpected behaviour {:?}", other),
        }
    }

    #[test]
    fn sprite_ticks_by_velocity() {
        let mut sprite = BehaviourKind::Sprite.instantiate();
        sprite.apply_property("vx", &json!(0.5));
        sprite.apply_property("vz", &json!("2"));
        assert_eq!(sprite.tick(), Vector3::new(0.5, 0.0, 2.0));
    }
}
