//! CPU-side mesh data and vertex layouts.

use cgmath::{ElementWise, Vector3};

use crate::data_structures::instance::Instance;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex for MeshVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vector3<f32>>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self { min: first, max: first }, |mut aabb, p| {
            aabb.min = Vector3::new(aabb.min.x.min(p.x), aabb.min.y.min(p.y), aabb.min.z.min(p.z));
            aabb.max = Vector3::new(aabb.max.x.max(p.x), aabb.max.y.max(p.y), aabb.max.z.max(p.z));
            aabb
        }))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Vector3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vector3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// The box enclosing this one after `transform` is applied to its corners.
    pub fn transformed(&self, transform: &Instance) -> Aabb {
        let corners = (0..8).map(|i| {
            let pick = Vector3::new(
                if i & 1 == 0 { 0.0 } else { 1.0 },
                if i & 2 == 0 { 0.0 } else { 1.0 },
                if i & 4 == 0 { 0.0 } else { 1.0 },
            );
            transform.transform_point(self.min + self.size().mul_element_wise(pick))
        });
        // eight corners, never empty
        Aabb::from_points(corners).unwrap_or(*self)
    }

    /// Transform that moves the box center to the origin and scales its
    /// largest dimension to `extent`.
    pub fn fit_transform(&self, extent: f32) -> Instance {
        let size = self.size();
        let max_dim = size.x.max(size.y).max(size.z);
        let factor = if max_dim > f32::EPSILON {
            extent / max_dim
        } else {
            1.0
        };
        Instance::new()
            .with_uniform_scale(factor)
            .with_position(-self.center() * factor)
    }
}

/// Triangle geometry of one glTF primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub bounds: Option<Aabb>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| Vector3::from(v.position)));
        Self {
            vertices,
            indices,
            bounds,
        }
    }
}
