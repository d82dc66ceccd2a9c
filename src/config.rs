//! Stage configuration.
//!
//! There is no file format: a [`StageConfig`] is built in code, usually from
//! its `Default` and a [`Variant`], and handed to [`crate::flow::run`].

use std::sync::Arc;

use cgmath::Deg;

use crate::{
    camera::OrbitSettings,
    data_structures::{
        light::studio_rig,
        material::{MaterialRule, MaterialSpec},
        scene_graph::{Scene, SceneNode},
    },
    resources::{
        AssetRoot,
        loader::{PlacementMode, RingLayout},
    },
};

/// The three ways the showcase can treat its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Crystal material on meshes named like a case, matte white elsewhere;
    /// repeated loads keep the single copy.
    #[default]
    Showcase,
    /// Crystal material on every mesh; single copy.
    Uniform,
    /// Showcase materials; every load adds a ring of six smaller copies.
    Carousel,
}

impl Variant {
    pub fn material_rule(&self) -> MaterialRule {
        match self {
            Variant::Showcase | Variant::Carousel => MaterialRule::ByName {
                needle: "case".to_string(),
                matched: Arc::new(MaterialSpec::crystal_case()),
                fallback: Arc::new(MaterialSpec::flat_white()),
            },
            Variant::Uniform => MaterialRule::Uniform(Arc::new(MaterialSpec::crystal_case())),
        }
    }

    pub fn placement_mode(&self) -> PlacementMode {
        match self {
            Variant::Showcase | Variant::Uniform => PlacementMode::Single,
            Variant::Carousel => PlacementMode::Ring(RingLayout::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub fov_y: Deg<f32>,
    pub near: f32,
    pub far: f32,
    /// Distance from the origin along +Z at startup.
    pub distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y: Deg(75.0),
            near: 0.1,
            far: 1000.0,
            distance: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub strength: f32,
    /// Spread of the glow, `0..=1`.
    pub radius: f32,
    /// Luminance above which pixels start to glow.
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub asset_root: AssetRoot,
    pub model_path: String,
    /// Equirectangular image used for reflections, relative to the asset root.
    pub environment: Option<String>,
    pub variant: Variant,
    pub camera: CameraConfig,
    pub orbit: OrbitSettings,
    pub bloom: BloomSettings,
    pub exposure: f32,
    pub clear_colour: wgpu::Color,
    /// Largest side of a freshly loaded model after fitting; `None` keeps its size.
    pub fit_extent: Option<f32>,
    /// Save frame number `n` (counting from 1) and exit. `Some(0)` saves the first frame.
    pub capture_after_frames: Option<u32>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            title: "vitrine".to_string(),
            width: 1280,
            height: 720,
            asset_root: AssetRoot::default(),
            model_path: "case-dispersion.glb".to_string(),
            environment: Some("paint.png".to_string()),
            variant: Variant::default(),
            camera: CameraConfig::default(),
            orbit: OrbitSettings::default(),
            bloom: BloomSettings::default(),
            exposure: 1.0,
            clear_colour: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 0.0,
            },
            fit_extent: Some(5.0),
            capture_after_frames: None,
        }
    }
}

impl StageConfig {
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Number of the frame an unattended run saves, counting from 1.
    pub fn capture_frame(&self) -> Option<u32> {
        self.capture_after_frames.map(|frames| frames.max(1))
    }
}

/// Adds the studio lights and the environment to `scene`.
pub fn configure_scene(config: &StageConfig, scene: &mut Scene) {
    for (i, light) in studio_rig().into_iter().enumerate() {
        scene.add_node(SceneNode::light(format!("studio_light_{i}"), light));
    }
    if let Some(environment) = &config.environment {
        scene.set_environment(environment.clone());
    }
}
