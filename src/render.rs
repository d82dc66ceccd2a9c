//! GPU side of the scene and draw batching.
//!
//! [`GpuScene`] mirrors the CPU [`Scene`]: every mesh node of every placement
//! becomes one [`DrawBatch`] holding the node's primitives, one instance per
//! copy of the placement and the node's material uniform. Batches are rebuilt
//! whenever the scene's revision changes; vertex data is uploaded once per
//! [`MeshData`] and shared between batches.
//!
//! Opaque batches are drawn first, transparent ones afterwards sorted back to
//! front. All copies of a transparent batch go out in one instanced draw
//! without depth writes, so their instance buffer is rewritten every frame with
//! the furthest copy first.

use std::{rc::Rc, sync::Arc};

use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        instance::{Instance, InstanceRaw},
        material::{MaterialInstance, MaterialSpec, MaterialUniform},
        model::{MeshData, MeshVertex},
        scene_graph::{MeshNode, NodeKind, Scene},
    },
    pipelines::scene::ScenePipelines,
};

/// Vertex and index buffers of one primitive.
#[derive(Debug)]
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, name: &str, data: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Vertex Buffer")),
            contents: bytemuck::cast_slice::<MeshVertex, u8>(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Index Buffer")),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: data.indices.len() as u32,
        }
    }
}

/// One mesh node drawn for every copy of its placement.
#[derive(Debug)]
pub struct DrawBatch {
    pub name: String,
    primitives: Vec<Rc<GpuMesh>>,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
    material: MaterialInstance,
    material_buffer: wgpu::Buffer,
    material_bind_group: wgpu::BindGroup,
    /// World transform of every copy, in placement order.
    world: Vec<Instance>,
    /// Center of the node's bounds in its own space.
    local_center: Vector3<f32>,
    /// World-space center used to order transparent batches.
    center: Vector3<f32>,
}

impl DrawBatch {
    pub fn is_transparent(&self) -> bool {
        self.material.template.transparent
    }

    pub fn is_double_sided(&self) -> bool {
        self.material.template.double_sided
    }
}

#[derive(Debug)]
pub struct GpuScene {
    revision: Option<u64>,
    meshes: Vec<(Arc<MeshData>, Rc<GpuMesh>)>,
    batches: Vec<DrawBatch>,
    default_material: Arc<MaterialSpec>,
}

impl Default for GpuScene {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuScene {
    pub fn new() -> Self {
        Self {
            revision: None,
            meshes: Vec::new(),
            batches: Vec::new(),
            default_material: Arc::new(MaterialSpec::default()),
        }
    }

    pub fn is_synced(&self, scene: &Scene) -> bool {
        self.revision == Some(scene.revision())
    }

    /// Rebuilds the draw batches if `scene` changed since the last sync.
    /// Returns whether anything was rebuilt.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        material_layout: &wgpu::BindGroupLayout,
        scene: &Scene,
    ) -> bool {
        if self.is_synced(scene) {
            return false;
        }

        let mut batches = Vec::new();
        for placement in scene.placements() {
            let copies = placement.world_instances();
            if copies.is_empty() {
                continue;
            }
            let mut mesh_nodes: Vec<(&str, &MeshNode, Instance)> = Vec::new();
            placement.model.visit(&Instance::new(), &mut |node, world| {
                if let NodeKind::Mesh(mesh) = &node.kind {
                    mesh_nodes.push((&node.name, mesh, *world));
                }
            });

            for (name, mesh, node_world) in mesh_nodes {
                let primitives: Vec<Rc<GpuMesh>> = mesh
                    .primitives
                    .iter()
                    .filter(|data| !data.indices.is_empty())
                    .map(|data| self.upload(device, name, data))
                    .collect();
                if primitives.is_empty() {
                    continue;
                }
                let material = mesh
                    .material
                    .clone()
                    .unwrap_or_else(|| MaterialInstance::new(self.default_material.clone(), 0.0));
                batches.push(self.mk_batch(
                    device,
                    material_layout,
                    name,
                    mesh,
                    primitives,
                    &copies,
                    &node_world,
                    material,
                ));
            }
        }

        log::debug!(
            "scene revision {} synced: {} batches",
            scene.revision(),
            batches.len()
        );
        self.batches = batches;
        // Drop uploads no batch refers to anymore.
        self.meshes.retain(|(_, gpu)| Rc::strong_count(gpu) > 1);
        self.revision = Some(scene.revision());
        true
    }

    fn upload(&mut self, device: &wgpu::Device, name: &str, data: &Arc<MeshData>) -> Rc<GpuMesh> {
        if let Some((_, gpu)) = self.meshes.iter().find(|(known, _)| Arc::ptr_eq(known, data)) {
            return gpu.clone();
        }
        let gpu = Rc::new(GpuMesh::new(device, name, data));
        self.meshes.push((data.clone(), gpu.clone()));
        gpu
    }

    #[allow(clippy::too_many_arguments)]
    fn mk_batch(
        &self,
        device: &wgpu::Device,
        material_layout: &wgpu::BindGroupLayout,
        name: &str,
        mesh: &MeshNode,
        primitives: Vec<Rc<GpuMesh>>,
        copies: &[Instance],
        node_world: &Instance,
        material: MaterialInstance,
    ) -> DrawBatch {
        let world: Vec<Instance> = copies.iter().map(|copy| copy * node_world).collect();
        let raw: Vec<InstanceRaw> = world.iter().map(Instance::to_raw).collect();
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Instance Buffer")),
            contents: bytemuck::cast_slice(&raw),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        let local_center = mesh
            .primitives
            .iter()
            .filter_map(|p| p.bounds)
            .reduce(|a, b| a.union(&b))
            .map(|bounds| bounds.center())
            .unwrap_or(Vector3::new(0.0, 0.0, 0.0));
        let center = world
            .iter()
            .map(|w| w.transform_point(local_center))
            .fold(Vector3::new(0.0, 0.0, 0.0), |acc, p| acc + p)
            / world.len() as f32;

        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} Material Buffer")),
            contents: bytemuck::cast_slice(&[material.evaluate(0.0)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: material_buffer.as_entire_binding(),
            }],
            label: Some(&format!("{name} Material Bind Group")),
        });

        DrawBatch {
            name: name.to_string(),
            primitives,
            instance_buffer,
            instance_count: raw.len() as u32,
            material,
            material_buffer,
            material_bind_group,
            world,
            local_center,
            center,
        }
    }

    /// Writes every batch's material parameters at `time` seconds.
    pub fn update_materials(&self, queue: &wgpu::Queue, time: f32) {
        for batch in &self.batches {
            let uniform: MaterialUniform = batch.material.evaluate(time);
            queue.write_buffer(&batch.material_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }

    /// Reorders the copies of every transparent batch furthest first as seen from `eye`.
    pub fn sort_transparent_copies(&self, queue: &wgpu::Queue, eye: Vector3<f32>) {
        for batch in &self.batches {
            if !batch.is_transparent() || batch.world.len() < 2 {
                continue;
            }
            let raw: Vec<InstanceRaw> = back_to_front(&batch.world, batch.local_center, eye)
                .iter()
                .map(Instance::to_raw)
                .collect();
            queue.write_buffer(&batch.instance_buffer, 0, bytemuck::cast_slice(&raw));
        }
    }

    /// Opaque batches in scene order, then transparent ones furthest first.
    pub fn draw_order(&self, eye: Vector3<f32>) -> Vec<&DrawBatch> {
        let (mut order, mut transparent): (Vec<&DrawBatch>, Vec<&DrawBatch>) =
            self.batches.iter().partition(|batch| !batch.is_transparent());
        transparent.sort_by(|a, b| {
            let da = (a.center - eye).magnitude2();
            let db = (b.center - eye).magnitude2();
            db.total_cmp(&da)
        });
        order.extend(transparent);
        order
    }

    /// Records the draws; camera, light and environment bind groups (0..=2)
    /// must already be set on `render_pass`.
    pub fn draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        pipelines: &ScenePipelines,
        eye: Vector3<f32>,
    ) {
        for batch in self.draw_order(eye) {
            if batch.instance_count == 0 {
                log::warn!("skipping {} without instances", batch.name);
                continue;
            }
            render_pass.set_pipeline(pipelines.select(batch.is_transparent(), batch.is_double_sided()));
            render_pass.set_bind_group(3, &batch.material_bind_group, &[]);
            render_pass.set_vertex_buffer(1, batch.instance_buffer.slice(..));
            for mesh in &batch.primitives {
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.num_indices, 0, 0..batch.instance_count);
            }
        }
    }
}

/// `copies` ordered by the distance of their `local_center` to `eye`, furthest first.
pub fn back_to_front(
    copies: &[Instance],
    local_center: Vector3<f32>,
    eye: Vector3<f32>,
) -> Vec<Instance> {
    let distance = |copy: &Instance| (copy.transform_point(local_center) - eye).magnitude2();
    let mut sorted = copies.to_vec();
    sorted.sort_by(|a, b| distance(b).total_cmp(&distance(a)));
    sorted
}
