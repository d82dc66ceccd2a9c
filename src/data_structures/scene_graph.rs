//! Scene graph and model placements.
//!
//! A [`SceneNode`] tree is what the glTF decoder produces and what the model
//! cache keeps. The tree is never mutated once cached: putting a model into the
//! [`Scene`] creates a [`Placement`], which owns the per-copy transforms while
//! the geometry and materials stay shared.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use cgmath::Vector3;

use crate::data_structures::{
    instance::Instance,
    light::Light,
    material::MaterialInstance,
    model::{Aabb, MeshData},
};

/// Renderable geometry plus the material it was assigned.
#[derive(Clone, Debug)]
pub struct MeshNode {
    pub primitives: Vec<Arc<MeshData>>,
    pub material: Option<MaterialInstance>,
}

/// What a node is, decided once when the tree is built.
#[derive(Clone, Debug)]
pub enum NodeKind {
    Mesh(MeshNode),
    Group,
    Light(Light),
    /// Cameras and anything else a file may contain that is not drawn.
    Other,
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub local: Instance,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            local: Instance::new(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, primitives: Vec<Arc<MeshData>>) -> Self {
        Self::new(
            name,
            NodeKind::Mesh(MeshNode {
                primitives,
                material: None,
            }),
        )
    }

    /// A light node; spot lights are placed at their configured position.
    pub fn light(name: impl Into<String>, light: Light) -> Self {
        let mut node = Self::new(name, NodeKind::Light(light));
        if let Light::Spot(spec) = light {
            node.local.position = spec.position;
        }
        node
    }

    pub fn with_local(mut self, local: Instance) -> Self {
        self.local = local;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, NodeKind::Mesh(_))
    }

    /// Depth-first walk handing every node its world transform.
    pub fn visit<'a>(&'a self, parent: &Instance, f: &mut dyn FnMut(&'a SceneNode, &Instance)) {
        let world = parent * &self.local;
        f(self, &world);
        for child in &self.children {
            child.visit(&world, f);
        }
    }

    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut SceneNode)) {
        f(self);
        for child in self.children.iter_mut() {
            child.visit_mut(f);
        }
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.visit(&Instance::new(), &mut |node, _| {
            if node.is_mesh() {
                count += 1;
            }
        });
        count
    }

    /// Bounds of all mesh geometry below and including this node, in the
    /// space of this node's parent.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        self.visit(&Instance::new(), &mut |node, world| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                for primitive in &mesh.primitives {
                    if let Some(local) = primitive.bounds {
                        let b = local.transformed(world);
                        bounds = Some(match bounds {
                            Some(acc) => acc.union(&b),
                            None => b,
                        });
                    }
                }
            }
        });
        bounds
    }
}

/// One model in the scene and the transforms of each of its copies.
#[derive(Clone, Debug)]
pub struct Placement {
    pub model: Arc<SceneNode>,
    /// Applied to the model before any instance transform.
    pub base: Instance,
    pub instances: Vec<Instance>,
}

impl Placement {
    pub fn world_instances(&self) -> Vec<Instance> {
        self.instances
            .iter()
            .map(|instance| instance * &self.base)
            .collect()
    }
}

/// The scene as shared between the render loop and load tasks.
pub type SharedScene = Rc<RefCell<Scene>>;

/// Everything that gets drawn: configured nodes (lights) and model placements.
#[derive(Debug, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    placements: Vec<Placement>,
    environment: Option<String>,
    revision: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every structural change so the GPU side knows when to resync.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn add_node(&mut self, node: SceneNode) {
        self.nodes.push(node);
        self.revision += 1;
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement_of(&self, model: &Arc<SceneNode>) -> Option<&Placement> {
        self.placements
            .iter()
            .find(|placement| Arc::ptr_eq(&placement.model, model))
    }

    fn placement_index(&mut self, model: &Arc<SceneNode>) -> usize {
        match self
            .placements
            .iter()
            .position(|placement| Arc::ptr_eq(&placement.model, model))
        {
            Some(idx) => idx,
            None => {
                self.placements.push(Placement {
                    model: model.clone(),
                    base: Instance::new(),
                    instances: Vec::new(),
                });
                self.placements.len() - 1
            }
        }
    }

    /// Puts `model` into the scene once. Attaching a model that is already
    /// attached leaves the scene as it is.
    pub fn attach(&mut self, model: &Arc<SceneNode>) {
        let idx = self.placement_index(model);
        let placement = &mut self.placements[idx];
        if placement.instances.is_empty() {
            placement.instances.push(Instance::new());
            self.revision += 1;
        }
    }

    /// Adds copies of `model` with the given transforms.
    pub fn spawn(&mut self, model: &Arc<SceneNode>, instances: impl IntoIterator<Item = Instance>) {
        let idx = self.placement_index(model);
        self.placements[idx].instances.extend(instances);
        self.revision += 1;
    }

    pub fn set_base(&mut self, model: &Arc<SceneNode>, base: Instance) {
        let idx = self.placement_index(model);
        self.placements[idx].base = base;
        self.revision += 1;
    }

    pub fn instance_count(&self) -> usize {
        self.placements.iter().map(|p| p.instances.len()).sum()
    }

    pub fn set_environment(&mut self, path: impl Into<String>) {
        self.environment = Some(path.into());
        self.revision += 1;
    }

    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }

    /// All lights with their world positions.
    pub fn lights(&self) -> Vec<(&Light, Vector3<f32>)> {
        let mut lights = Vec::new();
        for node in &self.nodes {
            node.visit(&Instance::new(), &mut |node, world| {
                if let NodeKind::Light(light) = &node.kind {
                    lights.push((light, world.position));
                }
            });
        }
        lights
    }
}
