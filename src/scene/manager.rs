use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use anyhow::Context;
use cgmath::Vector3;

use crate::{
    data_structures::{
        behaviour::{Behaviour, SceneInfo},
        entity::EntityId,
        scene_graph::Registry,
    },
    resources::asset_path,
    scene::{
        parser::{Directive, SceneDocument, Statement, parse_scene},
        tilemap::Tilemap,
        writer::write_scene,
    },
};

/// Bookkeeping for one scene file loaded through [`SceneManager::load`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedScene {
    pub name: String,
    /// The scene entity created for the file.
    pub root: EntityId,
    /// Every entity the load created, the scene entity and nested files included.
    pub ids: Vec<EntityId>,
}

/// What a top-level load accumulates across nested files.
struct LoadState {
    /// Files currently being instantiated, outermost first.
    stack: Vec<String>,
    ids: Vec<EntityId>,
    nested: Vec<(String, LoadedScene)>,
}

fn scene_name(registry: &Registry, scene: EntityId) -> String {
    registry
        .get(scene)
        .and_then(|e| e.behaviour.scene())
        .map(|info| info.name.clone())
        .unwrap_or_default()
}

/// One nesting level while walking a scene body.
struct Level {
    parent: EntityId,
    last_object: Option<EntityId>,
}

/// Loads, unloads and saves scene files below a scene folder.
#[derive(Debug)]
pub struct SceneManager {
    folder: PathBuf,
    loaded: HashMap<String, LoadedScene>,
}

impl SceneManager {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            loaded: HashMap::new(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn loaded(&self, file: &str) -> Option<&LoadedScene> {
        self.loaded.get(file)
    }

    pub fn loaded_files(&self) -> impl Iterator<Item = &str> {
        self.loaded.keys().map(String::as_str)
    }

    /// Load `file` with its origin at `base` and attach it under the root.
    /// A file that is already loaded is unloaded first. Only failing to open
    /// `file` itself is an error; problems inside it are logged and skipped.
    ///
    /// Every nested scene file gets its own record as well, so it can be
    /// unloaded without its parent.
    pub fn load(
        &mut self,
        registry: &mut Registry,
        file: &str,
        base: Vector3<f32>,
    ) -> anyhow::Result<EntityId> {
        let path = asset_path(&self.folder, file);
        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not open scene file {}", path.display()))?;

        if self.loaded.contains_key(file) {
            log::info!("Scene {} is already loaded, reloading", file);
            self.unload(registry, file);
        }

        let mut state = LoadState {
            stack: vec![file.to_string()],
            ids: Vec::new(),
            nested: Vec::new(),
        };
        let root = self.instantiate_document(registry, file, &source, base, &mut state)?;

        let name = scene_name(registry, root);
        log::info!("Loaded scene '{}' from {} ({} entities)", name, file, state.ids.len());
        log::debug!("Scene tree:\n{}", registry.tree_string(registry.root()));
        for (nested_file, record) in state.nested {
            if self.loaded.insert(nested_file.clone(), record).is_some() {
                log::debug!("Record for {} now points at its copy inside {}", nested_file, file);
            }
        }
        self.loaded.insert(
            file.to_string(),
            LoadedScene {
                name,
                root,
                ids: state.ids,
            },
        );
        Ok(root)
    }

    fn instantiate_document(
        &self,
        registry: &mut Registry,
        file: &str,
        source: &str,
        base: Vector3<f32>,
        state: &mut LoadState,
    ) -> anyhow::Result<EntityId> {
        let SceneDocument { name, body, .. } = parse_scene(source);
        let name = name.filter(|n| !n.is_empty()).unwrap_or_else(|| file.to_string());

        let scene = registry
            .instantiate("scene", "", &name, base)
            .with_context(|| format!("no scene behaviour registered while loading {}", file))?;
        if let Some(entity) = registry.get_mut(scene) {
            entity.behaviour = Behaviour::Scene(SceneInfo {
                name,
                source: Some(file.to_string()),
            });
        }
        state.ids.push(scene);

        let mut levels = vec![Level {
            parent: scene,
            last_object: None,
        }];
        for statement in body {
            let Some(level) = levels.last_mut() else {
                break;
            };
            match statement {
                Statement::Directive {
                    directive,
                    closed,
                    line,
                } => {
                    let parent = level.parent;
                    let created =
                        self.apply_directive(registry, directive, parent, base, state, line);
                    if let Some(level) = levels.last_mut() {
                        level.last_object = if closed { None } else { created };
                    }
                }
                Statement::Ignored { .. } => level.last_object = None,
                Statement::Open { .. } => {
                    let parent = level.last_object.unwrap_or(level.parent);
                    levels.push(Level {
                        parent,
                        last_object: None,
                    });
                }
                Statement::Close { owner_closed, .. } => {
                    if levels.len() > 1 {
                        levels.pop();
                    }
                    if owner_closed {
                        if let Some(level) = levels.last_mut() {
                            level.last_object = None;
                        }
                    }
                }
            }
        }
        Ok(scene)
    }

    /// Run one directive under `parent`. Returns the object a following
    /// `{` may nest under.
    fn apply_directive(
        &self,
        registry: &mut Registry,
        directive: Directive,
        parent: EntityId,
        base: Vector3<f32>,
        state: &mut LoadState,
        line: usize,
    ) -> Option<EntityId> {
        match directive {
            Directive::Object {
                name,
                class,
                subclass,
                offset,
            } => {
                let position = base + offset.cast::<f32>()?;
                let id = registry.instantiate(&class, &subclass, &name, position)?;
                registry.add_child(parent, id);
                state.ids.push(id);
                Some(id)
            }
            Directive::Tilemap { path, offset } => {
                let tilemap = match Tilemap::from_file(&asset_path(&self.folder, &path)) {
                    Ok(tilemap) => tilemap,
                    Err(e) => {
                        log::warn!("line {}: skipping tilemap: {:#}", line, e);
                        return None;
                    }
                };
                for id in tilemap.instantiate(registry, base + offset.cast::<f32>()?) {
                    registry.add_child(parent, id);
                    state.ids.push(id);
                }
                None
            }
            Directive::Scene { path, offset } => {
                if state.stack.contains(&path) {
                    log::warn!("line {}: scene {} includes itself, skipped", line, path);
                    return None;
                }
                let full = asset_path(&self.folder, &path);
                let source = match std::fs::read_to_string(&full) {
                    Ok(source) => source,
                    Err(e) => {
                        log::warn!(
                            "line {}: cannot open nested scene {}: {}",
                            line,
                            full.display(),
                            e
                        );
                        return None;
                    }
                };
                let first = state.ids.len();
                state.stack.push(path.clone());
                let nested = self.instantiate_document(
                    registry,
                    &path,
                    &source,
                    base + offset.cast::<f32>()?,
                    state,
                );
                state.stack.pop();
                match nested {
                    Ok(nested) => {
                        registry.add_child(parent, nested);
                        let record = LoadedScene {
                            name: scene_name(registry, nested),
                            root: nested,
                            ids: state.ids[first..].to_vec(),
                        };
                        state.nested.push((path, record));
                    }
                    Err(e) => log::warn!("line {}: nested scene {} failed: {:#}", line, path, e),
                }
                None
            }
        }
    }

    /// Remove every entity recorded for `file`. Returns how many were
    /// removed, or `None` if the file is not loaded. Records of scenes nested
    /// inside `file` are dropped with it. Ids already removed through a
    /// nested unload are skipped.
    pub fn unload(&mut self, registry: &mut Registry, file: &str) -> Option<usize> {
        let scene = self.loaded.remove(file)?;
        let removed = registry.remove_by_ids(&scene.ids);
        let gone: HashSet<EntityId> = scene.ids.into_iter().collect();
        self.loaded.retain(|_, record| !gone.contains(&record.root));
        log::info!("Unloaded scene {} ({} entities)", file, removed);
        Some(removed)
    }

    /// Serialize the scene rooted at `scene` into `file` below the scene folder.
    pub fn save(&self, registry: &Registry, scene: EntityId, file: &str) -> anyhow::Result<()> {
        let text = write_scene(registry, scene)
            .with_context(|| format!("entity {} is not a scene", scene))?;
        let path = asset_path(&self.folder, file);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, text).with_context(|| format!("writing scene {}", path.display()))?;
        log::info!("Saved scene {} to {}", scene, path.display());
        Ok(())
    }
}
