use std::fmt::Write;

use cgmath::Vector3;

use crate::data_structures::{
    entity::{Entity, EntityId},
    scene_graph::Registry,
};

const INDENT: &str = "    ";

fn rounded(v: Vector3<f32>) -> Vector3<i32> {
    Vector3::new(v.x.round() as i32, v.y.round() as i32, v.z.round() as i32)
}

/// Scene files are whitespace separated, so names may not contain blanks.
fn sanitize(word: &str) -> String {
    word.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Render the scene rooted at `scene` as scene text. Coordinates are relative
/// to the scene entity and rounded to integers. Returns `None` if `scene` is
/// not a scene entity.
pub fn write_scene(registry: &Registry, scene: EntityId) -> Option<String> {
    let root = registry.get(scene)?;
    let info = root.behaviour.scene()?;
    let name = if info.name.is_empty() { "unnamed" } else { info.name.as_str() };

    let mut out = String::new();
    let _ = writeln!(out, "SCENE {} {{", name);
    for &child in root.children() {
        write_entity(registry, child, root.position, 1, &mut out);
    }
    out.push_str("}\n");
    Some(out)
}

fn write_entity(
    registry: &Registry,
    id: EntityId,
    origin: Vector3<f32>,
    depth: usize,
    out: &mut String,
) {
    let Some(entity) = registry.get(id) else {
        return;
    };
    let indent = INDENT.repeat(depth);
    let offset = rounded(entity.position - origin);

    if let Some(info) = entity.behaviour.scene() {
        match &info.source {
            Some(source) => {
                let _ = writeln!(
                    out,
                    "{}SCENE {} {} {} {};",
                    indent, source, offset.x, offset.y, offset.z
                );
            }
            None => log::warn!(
                "Scene entity {} has no source file and cannot be saved as a reference",
                id
            ),
        }
        return;
    }

    let _ = write!(out, "{}OBJECT {}", indent, object_head(entity));
    let _ = write!(out, " {} {} {}", offset.x, offset.y, offset.z);
    if entity.children().is_empty() {
        out.push_str(";\n");
        return;
    }
    out.push_str(" {\n");
    for &child in entity.children() {
        write_entity(registry, child, origin, depth + 1, out);
    }
    let _ = writeln!(out, "{}}};", indent);
}

/// `name class[.sub]`. Nameless entities get `obj<id>` so the file stays in
/// the named form.
fn object_head(entity: &Entity) -> String {
    let class = sanitize(&entity.qualified_class());
    if entity.name.trim().is_empty() {
        format!("obj{} {}", entity.id(), class)
    } else {
        format!("{} {}", sanitize(&entity.name), class)
    }
}
