//! Model loading: decode once per path, then place the model on every request.

use std::{fmt, rc::Rc, sync::Arc};

use futures::future::{FutureExt, LocalBoxFuture};

use crate::{
    data_structures::{
        instance::Instance,
        material::{MaterialInstance, MaterialRule},
        scene_graph::{NodeKind, SceneNode, SharedScene},
    },
    error::LoadFailure,
    resources::{
        AssetRoot,
        cache::{ModelCache, Slot},
        gltf::load_gltf,
    },
};

/// Produces a scene tree for a resource path.
pub trait ModelDecoder {
    fn decode(&self, path: &str) -> LocalBoxFuture<'static, Result<SceneNode, LoadFailure>>;
}

/// Reads glTF/GLB files relative to an [`AssetRoot`].
#[derive(Clone, Debug, Default)]
pub struct GltfDecoder {
    root: AssetRoot,
}

impl GltfDecoder {
    pub fn new(root: AssetRoot) -> Self {
        Self { root }
    }
}

impl ModelDecoder for GltfDecoder {
    fn decode(&self, path: &str) -> LocalBoxFuture<'static, Result<SceneNode, LoadFailure>> {
        let root = self.root.clone();
        let path = path.to_string();
        async move {
            load_gltf(&root, &path)
                .await
                .map_err(|e| LoadFailure::new(path.clone(), e))
        }
        .boxed_local()
    }
}

/// Copies arranged around the vertical axis, stacked upwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingLayout {
    pub count: usize,
    pub vertical_step: f32,
    pub scale: f32,
}

impl Default for RingLayout {
    fn default() -> Self {
        Self {
            count: 6,
            vertical_step: 0.5,
            scale: 0.5,
        }
    }
}

impl RingLayout {
    /// Copy `i` is turned by `i * 360° / count` and lifted by `i * vertical_step`.
    pub fn instances(&self) -> Vec<Instance> {
        let step = std::f32::consts::TAU / self.count.max(1) as f32;
        (0..self.count)
            .map(|i| {
                Instance::from_yaw(cgmath::Rad(step * i as f32))
                    .with_position(cgmath::Vector3::new(0.0, self.vertical_step * i as f32, 0.0))
                    .with_uniform_scale(self.scale)
            })
            .collect()
    }
}

/// What a load request does to the scene once the model is available.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlacementMode {
    /// Keep exactly one copy in the scene.
    Single,
    /// Add a ring of copies per request.
    Ring(RingLayout),
}

pub struct ModelLoader {
    cache: ModelCache<Arc<SceneNode>>,
    decoder: Rc<dyn ModelDecoder>,
    scene: SharedScene,
    materials: MaterialRule,
    mode: PlacementMode,
    fit_extent: Option<f32>,
}

impl fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelLoader")
            .field("cache", &self.cache)
            .field("materials", &self.materials)
            .field("mode", &self.mode)
            .field("fit_extent", &self.fit_extent)
            .finish_non_exhaustive()
    }
}

impl ModelLoader {
    pub fn new(
        decoder: Rc<dyn ModelDecoder>,
        scene: SharedScene,
        materials: MaterialRule,
        mode: PlacementMode,
    ) -> Self {
        Self {
            cache: ModelCache::new(),
            decoder,
            scene,
            materials,
            mode,
            fit_extent: None,
        }
    }

    /// Newly placed models are centered and scaled so their largest side is `extent`.
    pub fn with_fit_extent(mut self, extent: Option<f32>) -> Self {
        self.fit_extent = extent;
        self
    }

    pub fn cache(&self) -> &ModelCache<Arc<SceneNode>> {
        &self.cache
    }

    pub fn scene(&self) -> &SharedScene {
        &self.scene
    }

    /// Loads `path` (at most once, concurrent callers share the decode) and
    /// places it in the scene. A failed load is logged and yields `None`
    /// without touching the scene.
    pub async fn load_model(&self, path: &str) -> Option<Arc<SceneNode>> {
        let slot = self.cache.get_or_load(path, || self.start_decode(path));
        let model = match slot {
            Slot::Hit(model) => {
                log::debug!("{path} served from cache");
                model
            }
            Slot::Joined(load) => load.await?,
            Slot::Started(load) => load.await?,
        };
        self.place(&model);
        Some(model)
    }

    fn start_decode(&self, path: &str) -> LocalBoxFuture<'static, Option<Arc<SceneNode>>> {
        log::info!("decoding {path}");
        let decode = self.decoder.decode(path);
        let rule = self.materials.clone();
        async move {
            match decode.await {
                Ok(mut root) => {
                    assign_materials(&mut root, &rule);
                    Some(Arc::new(root))
                }
                Err(failure) => {
                    log::error!("Error loading model: {failure}");
                    None
                }
            }
        }
        .boxed_local()
    }

    fn place(&self, model: &Arc<SceneNode>) {
        let mut scene = self.scene.borrow_mut();
        let first_placement = scene.placement_of(model).is_none();
        if let Some(extent) = self.fit_extent.filter(|_| first_placement) {
            if let Some(bounds) = model.bounds() {
                scene.set_base(model, bounds.fit_transform(extent));
            }
        }
        match self.mode {
            PlacementMode::Single => scene.attach(model),
            PlacementMode::Ring(layout) => scene.spawn(model, layout.instances()),
        }
    }
}

/// Gives every mesh node its material; each node gets its own phase so
/// animated parameters do not move in lockstep.
pub fn assign_materials(root: &mut SceneNode, rule: &MaterialRule) {
    const GOLDEN_ANGLE: f32 = 2.399_963;
    let mut index = 0;
    root.visit_mut(&mut |node| {
        if let NodeKind::Mesh(mesh) = &mut node.kind {
            let template = rule.select(&node.name).clone();
            mesh.material = Some(MaterialInstance::new(template, index as f32 * GOLDEN_ANGLE));
            index += 1;
        }
    });
}
