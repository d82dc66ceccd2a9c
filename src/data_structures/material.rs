//! Material templates and their per-mesh instances.
//!
//! A [`MaterialSpec`] is immutable and shared by every mesh it is assigned to.
//! Time-driven parameters are never written back into the template: each mesh
//! holds a [`MaterialInstance`] with its own phase and evaluates the template at
//! the current time into a [`MaterialUniform`].

use std::sync::Arc;

/// Oscillation of the iridescence film thickness, in nanometres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IridescencePulse {
    pub min_thickness: f32,
    pub max_thickness: f32,
    /// Full cycles per second.
    pub frequency: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialSpec {
    pub name: String,
    /// Linear RGB base colour.
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    pub double_sided: bool,
    pub roughness: f32,
    pub metalness: f32,
    pub transmission: f32,
    pub thickness: f32,
    pub ior: f32,
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub iridescence: f32,
    pub iridescence_ior: f32,
    /// Thin-film thickness used when no pulse is configured.
    pub iridescence_thickness: f32,
    pub dispersion: f32,
    pub env_intensity: f32,
    pub pulse: Option<IridescencePulse>,
}

impl Default for MaterialSpec {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            transparent: false,
            double_sided: false,
            roughness: 1.0,
            metalness: 0.0,
            transmission: 0.0,
            thickness: 0.0,
            ior: 1.5,
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            iridescence: 0.0,
            iridescence_ior: 1.3,
            iridescence_thickness: 400.0,
            dispersion: 0.0,
            env_intensity: 1.0,
            pulse: None,
        }
    }
}

impl MaterialSpec {
    /// The glassy material of the display case.
    pub fn crystal_case() -> Self {
        Self {
            name: "crystal_case".to_string(),
            opacity: 0.5,
            transparent: true,
            roughness: 0.0,
            metalness: 0.0,
            transmission: 1.0,
            thickness: 10.0,
            ior: 2.5,
            clearcoat: 1.0,
            clearcoat_roughness: 0.1,
            iridescence: 1.0,
            dispersion: 1.0,
            env_intensity: 1.0,
            pulse: Some(IridescencePulse {
                min_thickness: 100.0,
                max_thickness: 400.0,
                frequency: 0.1,
            }),
            ..Default::default()
        }
    }

    /// Matte white for everything that is not the case.
    pub fn flat_white() -> Self {
        Self {
            name: "flat_white".to_string(),
            color: [1.0, 1.0, 1.0],
            roughness: 0.3,
            metalness: 0.2,
            double_sided: true,
            env_intensity: 0.0,
            ..Default::default()
        }
    }

    pub fn iridescence_thickness_at(&self, time: f32, phase: f32) -> f32 {
        match self.pulse {
            Some(pulse) => {
                let wave = (std::f32::consts::TAU * pulse.frequency * time + phase).sin();
                let t = 0.5 + 0.5 * wave;
                pulse.min_thickness + (pulse.max_thickness - pulse.min_thickness) * t
            }
            None => self.iridescence_thickness,
        }
    }
}

/// Which material each mesh of a freshly loaded model receives.
#[derive(Clone, Debug)]
pub enum MaterialRule {
    /// `matched` for meshes whose name contains `needle`, `fallback` otherwise.
    ByName {
        needle: String,
        matched: Arc<MaterialSpec>,
        fallback: Arc<MaterialSpec>,
    },
    /// One material for every mesh.
    Uniform(Arc<MaterialSpec>),
}

impl MaterialRule {
    pub fn select(&self, node_name: &str) -> &Arc<MaterialSpec> {
        match self {
            MaterialRule::ByName {
                needle,
                matched,
                fallback,
            } => {
                if node_name.contains(needle.as_str()) {
                    matched
                } else {
                    fallback
                }
            }
            MaterialRule::Uniform(material) => material,
        }
    }
}

/// A mesh's view of a shared template.
#[derive(Clone, Debug)]
pub struct MaterialInstance {
    pub template: Arc<MaterialSpec>,
    pub phase: f32,
}

impl MaterialInstance {
    pub fn new(template: Arc<MaterialSpec>, phase: f32) -> Self {
        Self { template, phase }
    }

    pub fn evaluate(&self, time: f32) -> MaterialUniform {
        let m = &*self.template;
        MaterialUniform {
            color: [m.color[0], m.color[1], m.color[2], m.opacity],
            surface: [m.roughness, m.metalness, m.transmission, m.thickness],
            optics: [m.ior, m.dispersion, m.env_intensity, m.double_sided as u32 as f32],
            coat: [
                m.clearcoat,
                m.clearcoat_roughness,
                m.iridescence,
                m.iridescence_ior,
            ],
            film: [m.iridescence_thickness_at(time, self.phase), 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    /// rgb + opacity
    pub color: [f32; 4],
    /// roughness, metalness, transmission, thickness
    pub surface: [f32; 4],
    /// ior, dispersion, env intensity, double sided
    pub optics: [f32; 4],
    /// clearcoat, clearcoat roughness, iridescence, iridescence ior
    pub coat: [f32; 4],
    /// iridescence thickness (nm)
    pub film: [f32; 4],
}
