//! Per-instance transforms and their GPU representation.
//!
//! An [`Instance`] is the local or world transform of a scene node, or one
//! placed copy of a model. Copies of a model share geometry and only differ by
//! their instance, which is packed into an [`InstanceRaw`] vertex buffer so a
//! mesh and all its copies go out in a single instanced draw call.

use std::ops::Mul;

use cgmath::{Deg, InnerSpace, One, Rotation3, SquareMatrix};

use crate::data_structures::model;

/// Translation, rotation and (possibly non-uniform) scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// The identity transform.
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Rotation of `angle` about the vertical (+Y) axis.
    pub fn from_yaw(angle: impl Into<cgmath::Rad<f32>>) -> Self {
        Self {
            rotation: cgmath::Quaternion::from_angle_y(angle),
            ..Self::new()
        }
    }

    pub fn with_position(mut self, position: cgmath::Vector3<f32>) -> Self {
        self.position = position;
        self
    }

    pub fn with_uniform_scale(mut self, factor: f32) -> Self {
        self.scale = cgmath::Vector3::new(factor, factor, factor);
        self
    }

    /// Angle of the rotation about +Y, in degrees within `(-180, 180]`.
    ///
    /// Only meaningful for rotations that are pure yaw.
    pub fn yaw(&self) -> Deg<f32> {
        let forward = self.rotation * cgmath::Vector3::unit_z();
        let flat = cgmath::Vector3::new(forward.x, 0.0, forward.z);
        if flat.magnitude2() == 0.0 {
            return Deg(0.0);
        }
        Deg::from(cgmath::Rad(forward.x.atan2(forward.z)))
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    pub fn transform_point(&self, point: cgmath::Vector3<f32>) -> cgmath::Vector3<f32> {
        let scaled = cgmath::Vector3::new(
            point.x * self.scale.x,
            point.y * self.scale.y,
            point.z * self.scale.z,
        );
        self.position + self.rotation * scaled
    }

    pub fn to_raw(&self) -> InstanceRaw {
        let world_matrix = self.to_matrix();
        let handedness = world_matrix.determinant().signum();
        // Normals need the inverse transpose of the linear part; for a
        // rotation times a diagonal scale that is rotation * scale^-1.
        let inv_scale = cgmath::Matrix3::from_diagonal(cgmath::Vector3::new(
            1.0 / self.scale.x,
            1.0 / self.scale.y,
            1.0 / self.scale.z,
        ));
        InstanceRaw {
            model: world_matrix.into(),
            normal: (cgmath::Matrix3::from(self.rotation) * inv_scale).into(),
            handedness,
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

/// Parent-times-child composition: `parent * local` yields the child's world
/// transform.
impl<'a, 'b> Mul<&'b Instance> for &'a Instance {
    type Output = Instance;

    fn mul(self, rhs: &'b Instance) -> Self::Output {
        let rotation = self.rotation * rhs.rotation;
        let scale = cgmath::Vector3::new(
            self.scale.x * rhs.scale.x,
            self.scale.y * rhs.scale.y,
            self.scale.z * rhs.scale.z,
        );
        Instance {
            position: self.transform_point(rhs.position),
            rotation,
            scale,
        }
    }
}

impl Mul<Instance> for Instance {
    type Output = Self;

    fn mul(self, rhs: Instance) -> Self::Output {
        &self * &rhs
    }
}

/**
 * The raw instance is the actual data stored on the GPU
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    handedness: f32,
}

/**
 * Stride layout: the model matrix as four vec4s, the normal matrix as three
 * vec3s and the handedness sign. Locations start at 5 to leave room for the
 * mesh vertex attributes.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}
