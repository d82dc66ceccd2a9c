//! Light descriptions and the studio rig.

use cgmath::{InnerSpace, Vector3};

/// Upper bound of spot lights the scene shader evaluates.
pub const MAX_SPOT_LIGHTS: usize = 4;

/// A spot light aimed at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSpec {
    /// Linear RGB.
    pub color: [f32; 3],
    pub position: Vector3<f32>,
    pub intensity: f32,
    /// Half-angle of the cone, in radians.
    pub angle: f32,
    /// Fraction of the cone that fades out, `0..=1`.
    pub penumbra: f32,
    pub decay: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Light {
    Spot(LightSpec),
    Ambient { color: [f32; 3], intensity: f32 },
}

/// Converts a `0xRRGGBB` sRGB colour to linear RGB.
pub fn hex_color(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Key light, blue back light, warm rim light and a dim ambient.
pub fn studio_rig() -> Vec<Light> {
    use std::f32::consts::PI;
    vec![
        Light::Spot(LightSpec {
            color: hex_color(0xffffff),
            position: Vector3::new(10.0, 5.0, 0.0),
            intensity: 50.0,
            angle: PI / 6.0,
            penumbra: 0.1,
            decay: 1.5,
        }),
        Light::Spot(LightSpec {
            color: hex_color(0xccccff),
            position: Vector3::new(-8.0, 3.0, -8.0),
            intensity: 40.0,
            angle: PI / 8.0,
            penumbra: 0.2,
            decay: 1.5,
        }),
        Light::Spot(LightSpec {
            color: hex_color(0xffffcc),
            position: Vector3::new(0.0, -5.0, -10.0),
            intensity: 30.0,
            angle: PI / 8.0,
            penumbra: 0.2,
            decay: 1.5,
        }),
        Light::Ambient {
            color: hex_color(0x404040),
            intensity: 0.3,
        },
    ]
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SpotLightRaw {
    /// xyz position, w intensity
    position: [f32; 4],
    /// xyz direction towards the target, w decay
    direction: [f32; 4],
    /// rgb colour, w unused
    color: [f32; 4],
    /// cos(outer angle), cos(inner angle), unused, unused
    cone: [f32; 4],
}

impl SpotLightRaw {
    pub fn new(spec: &LightSpec, world_position: Vector3<f32>) -> Self {
        let to_target = -world_position;
        let direction = if to_target.magnitude2() > 0.0 {
            to_target.normalize()
        } else {
            -Vector3::unit_y()
        };
        let outer = spec.angle.cos();
        let inner = (spec.angle * (1.0 - spec.penumbra.clamp(0.0, 1.0))).cos();
        Self {
            position: [
                world_position.x,
                world_position.y,
                world_position.z,
                spec.intensity,
            ],
            direction: [direction.x, direction.y, direction.z, spec.decay],
            color: [spec.color[0], spec.color[1], spec.color[2], 0.0],
            cone: [outer, inner, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    spots: [SpotLightRaw; MAX_SPOT_LIGHTS],
    /// rgb ambient radiance, w number of active spot lights
    ambient: [f32; 4],
}

impl LightUniform {
    /// Packs the lights of a scene; spots beyond [`MAX_SPOT_LIGHTS`] are dropped.
    pub fn pack<'a>(lights: impl IntoIterator<Item = (&'a Light, Vector3<f32>)>) -> Self {
        let mut spots = [SpotLightRaw::default(); MAX_SPOT_LIGHTS];
        let mut count = 0;
        let mut ambient = [0.0f32; 3];
        for (light, world_position) in lights {
            match light {
                Light::Spot(spec) => {
                    if count == MAX_SPOT_LIGHTS {
                        log::warn!("more than {MAX_SPOT_LIGHTS} spot lights, ignoring the rest");
                        continue;
                    }
                    spots[count] = SpotLightRaw::new(spec, world_position);
                    count += 1;
                }
                Light::Ambient { color, intensity } => {
                    for (acc, c) in ambient.iter_mut().zip(color) {
                        *acc += c * intensity;
                    }
                }
            }
        }
        Self {
            spots,
            ambient: [ambient[0], ambient[1], ambient[2], count as f32],
        }
    }

    pub fn spot_count(&self) -> usize {
        self.ambient[3] as usize
    }
}
