//! Application event loop.
//!
//! [`run`] opens the window, builds the [`Context`] and then drives everything
//! from winit events. Each redraw:
//! 1. Poll the pending local tasks (model and environment loads)
//! 2. Advance the [`FrameClock`] and the time-driven material parameters
//! 3. Apply orbit input, damping and auto-rotation to the camera
//! 4. Upload the scene again if a load changed it
//! 5. Render the scene into the HDR target, then bloom, tone mapping and FXAA
//! 6. Present, and save the frame if one was requested
//!
//! Loads never block the loop: frames keep rendering whatever the scene holds
//! until the model arrives.

use std::{cell::RefCell, fmt::Debug, future::Future, iter, rc::Rc, sync::Arc};

use instant::{Duration, Instant};

#[cfg(not(target_arch = "wasm32"))]
use futures::{executor::LocalPool, task::LocalSpawnExt};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    capture::{self, Capture, CAPTURE_FORMAT},
    config::{StageConfig, configure_scene},
    context::Context,
    data_structures::{
        light::LightUniform,
        scene_graph::{Scene, SharedScene},
        texture::Texture,
    },
    render::GpuScene,
    resources::{
        loader::{GltfDecoder, ModelLoader},
        texture::load_environment,
    },
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Time of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTime {
    /// Since the previous tick.
    pub dt: Duration,
    /// Since the first tick.
    pub elapsed: Duration,
}

/// Idle until the first frame, running from then on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameClock {
    #[default]
    Idle,
    Running { started: Instant, last: Instant },
}

impl FrameClock {
    pub fn new() -> Self {
        Self::Idle
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    /// The first tick starts the clock and reports no elapsed time.
    pub fn tick_at(&mut self, now: Instant) -> FrameTime {
        match *self {
            Self::Idle => {
                *self = Self::Running {
                    started: now,
                    last: now,
                };
                FrameTime {
                    dt: Duration::ZERO,
                    elapsed: Duration::ZERO,
                }
            }
            Self::Running { started, last } => {
                *self = Self::Running { started, last: now };
                FrameTime {
                    dt: now.duration_since(last),
                    elapsed: now.duration_since(started),
                }
            }
        }
    }
}

/// Why no frame was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameSkipped {
    /// The surface is lost, outdated or suboptimal and has to be configured again.
    Reconfigure,
    /// No texture this time (occluded window, timeout); the next redraw retries.
    Unavailable,
}

/// GPU context plus the scene it draws.
#[derive(Debug)]
pub struct AppState {
    pub(crate) ctx: Context,
    gpu_scene: GpuScene,
    scene: SharedScene,
    loader: Rc<ModelLoader>,
    is_surface_configured: bool,
    frames: u32,
    capture_requested: bool,
}

impl AppState {
    async fn new(window: Arc<Window>, config: &StageConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;

        let scene: SharedScene = Rc::new(RefCell::new(Scene::new()));
        configure_scene(config, &mut scene.borrow_mut());

        let decoder = Rc::new(GltfDecoder::new(config.asset_root.clone()));
        let loader = ModelLoader::new(
            decoder,
            scene.clone(),
            config.variant.material_rule(),
            config.variant.placement_mode(),
        )
        .with_fit_extent(config.fit_extent);

        Ok(Self {
            ctx,
            gpu_scene: GpuScene::new(),
            scene,
            loader: Rc::new(loader),
            is_surface_configured: false,
            frames: 0,
            capture_requested: false,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if self.ctx.resize(width, height) {
            self.is_surface_configured = true;
        }
    }

    pub fn request_capture(&mut self) {
        self.capture_requested = true;
    }

    /// Steps animation and camera, then picks up scene changes.
    fn update(&mut self, time: FrameTime) {
        self.gpu_scene
            .update_materials(&self.ctx.queue, time.elapsed.as_secs_f32());
        self.ctx.update_camera(time.dt.as_secs_f32());

        let scene = self.scene.borrow();
        if self.gpu_scene.sync(
            &self.ctx.device,
            &self.ctx.pipelines.material_layout,
            &scene,
        ) {
            self.ctx
                .light
                .update(&self.ctx.queue, LightUniform::pack(scene.lights()));
            // New batches were written with the parameters at time zero.
            self.gpu_scene
                .update_materials(&self.ctx.queue, time.elapsed.as_secs_f32());
        }
        self.gpu_scene
            .sort_transparent_copies(&self.ctx.queue, self.ctx.camera.camera.eye());
    }

    fn render(&mut self) -> Result<(), FrameSkipped> {
        // invoke main render loop
        self.ctx.window.request_redraw();

        // Rendering requires the surface to be configured
        if !self.is_surface_configured {
            return Ok(());
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output) => output,
            wgpu::CurrentSurfaceTexture::Suboptimal(_)
            | wgpu::CurrentSurfaceTexture::Outdated
            | wgpu::CurrentSurfaceTexture::Lost => return Err(FrameSkipped::Reconfigure),
            _ => return Err(FrameSkipped::Unavailable),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.ctx.post.scene_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            render_pass.set_bind_group(0, &self.ctx.camera.bind_group, &[]);
            render_pass.set_bind_group(1, &self.ctx.light.bind_group, &[]);
            render_pass.set_bind_group(2, &self.ctx.environment.bind_group, &[]);
            self.gpu_scene.draw(
                &mut render_pass,
                &self.ctx.pipelines,
                self.ctx.camera.camera.eye(),
            );
        }

        self.ctx.post.encode_composite(&mut encoder);
        if let Err(e) = self
            .ctx
            .post
            .encode_fxaa(&mut encoder, &view, self.ctx.config.format)
        {
            log::error!("Unable to anti-alias the frame: {e}");
        }

        let capture = if std::mem::take(&mut self.capture_requested) {
            let capture = Capture::new(&self.ctx.device, self.ctx.config.width, self.ctx.config.height);
            match self
                .ctx
                .post
                .encode_fxaa(&mut encoder, &capture.view, CAPTURE_FORMAT)
            {
                Ok(()) => {
                    capture.encode_copy(&mut encoder);
                    Some(capture)
                }
                Err(e) => {
                    log::error!("Unable to capture the frame: {e}");
                    None
                }
            }
        } else {
            None
        };

        self.ctx.queue.submit(iter::once(encoder.finish()));
        output.present();
        self.frames += 1;

        if let Some(capture) = capture {
            self.save_capture(capture);
        }
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn save_capture(&self, capture: Capture) {
        let saved = futures::executor::block_on(capture.read(&self.ctx.device))
            .and_then(|image| capture::save(&image));
        if let Err(e) = saved {
            log::error!("Unable to save the frame: {e}");
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn save_capture(&self, capture: Capture) {
        let device = self.ctx.device.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let saved = capture
                .read(&device)
                .await
                .and_then(|image| capture::save(&image));
            if let Err(e) = saved {
                log::error!("Unable to save the frame: {e}");
            }
        });
    }
}

/// Local tasks of the event loop thread.
///
/// Natively they sit in a [`LocalPool`] that is polled every frame; in the
/// browser they go to the page's own executor.
struct Tasks {
    #[cfg(not(target_arch = "wasm32"))]
    pool: LocalPool,
}

impl Tasks {
    fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            pool: LocalPool::new(),
        }
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        #[cfg(not(target_arch = "wasm32"))]
        if let Err(e) = self.pool.spawner().spawn_local(task) {
            log::error!("Unable to spawn task: {e}");
        }
        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn poll(&mut self) {
        self.pool.run_until_stalled();
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    proxy: EventLoopProxy<FlowEvent>,
    config: StageConfig,
    state: Option<AppState>,
    tasks: Tasks,
    clock: FrameClock,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: StageConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config,
            state: None,
            tasks: Tasks::new(),
            clock: FrameClock::new(),
        })
    }

    /// Called once the GPU context exists.
    fn start(&mut self, mut state: AppState) {
        let size = state.ctx.window.inner_size();
        state.resize(size.width, size.height);
        self.load_environment(&state);
        self.load_model(&state);
        state.ctx.window.request_redraw();
        self.state = Some(state);
    }

    fn load_model(&self, state: &AppState) {
        let loader = state.loader.clone();
        let path = self.config.model_path.clone();
        self.tasks.spawn(async move {
            if loader.load_model(&path).await.is_none() {
                log::warn!("{path} is not part of the scene");
            }
        });
    }

    fn load_environment(&self, state: &AppState) {
        let Some(file_name) = state.scene.borrow().environment().map(str::to_string) else {
            return;
        };
        let root = self.config.asset_root.clone();
        let device = state.ctx.device.clone();
        let queue = state.ctx.queue.clone();
        let proxy = self.proxy.clone();
        self.tasks.spawn(async move {
            match load_environment(&root, &file_name, &device, &queue).await {
                Ok(texture) => {
                    if proxy.send_event(FlowEvent::Environment(texture)).is_err() {
                        log::warn!("event loop closed before {file_name} arrived");
                    }
                }
                Err(e) => log::error!("Error loading environment {file_name}: {e}"),
            }
        });
    }

    #[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
    fn on_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode) {
        match code {
            KeyCode::KeyS => {
                if let Some(state) = &mut self.state {
                    state.request_capture();
                }
            }
            // Loads again; a cache hit is placed without decoding.
            KeyCode::KeyL => {
                if let Some(state) = &self.state {
                    self.load_model(state);
                }
            }
            KeyCode::Equal | KeyCode::Minus => {
                if let Some(state) = &mut self.state {
                    let step = if code == KeyCode::Equal { 1.1 } else { 1.0 / 1.1 };
                    let exposure = state.ctx.post.exposure() * step;
                    state.ctx.post.set_exposure(&state.ctx.queue, exposure);
                    log::debug!("exposure {exposure:.2}");
                }
            }
            #[cfg(not(target_arch = "wasm32"))]
            KeyCode::Escape => event_loop.exit(),
            _ => {}
        }
    }
}

pub(crate) enum FlowEvent {
    #[allow(dead_code)]
    Initialized(Box<AppState>),
    Environment(Texture),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Environment(_) => f.write_str("Environment"),
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.width,
                self.config.height,
            ));

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Unable to create a window: {e}");
                event_loop.exit();
                return;
            }
        };

        let config = self.config.clone();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let init = self.async_runtime.block_on(AppState::new(window, &config));
            match init {
                Ok(state) => self.start(state),
                Err(e) => {
                    log::error!("App initialization failed. Cannot create the main context: {e}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                match AppState::new(window, &config).await {
                    Ok(state) => {
                        assert!(
                            proxy
                                .send_event(FlowEvent::Initialized(Box::new(state)))
                                .is_ok()
                        );
                    }
                    Err(e) => log::error!(
                        "App initialization failed. Cannot create the main context: {e}"
                    ),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            // This is the message from our wasm `spawn_local`
            FlowEvent::Initialized(state) => self.start(*state),
            FlowEvent::Environment(texture) => {
                if let Some(state) = &mut self.state {
                    if let Err(e) = state.ctx.set_environment(texture) {
                        log::error!("Unable to bind the environment: {e}");
                    }
                }
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let Some(state) = &mut self.state {
            state.ctx.camera.controller.process_device_event(&event);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let state = match &mut self.state {
            Some(state) => state,
            None => return,
        };

        if state.ctx.camera.controller.process_window_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => self.on_key(event_loop, code),
            WindowEvent::RedrawRequested => {
                #[cfg(not(target_arch = "wasm32"))]
                {
                    // tokio::fs needs the runtime to hand reads to its blocking pool.
                    let _guard = self.async_runtime.enter();
                    self.tasks.poll();
                }

                let time = self.clock.tick();
                state.update(time);

                let capture_frame = self.config.capture_frame();
                if capture_frame.is_some_and(|frame| state.frames + 1 == frame) {
                    state.request_capture();
                }

                match state.render() {
                    Ok(()) => {
                        let captured = capture_frame.is_some_and(|frame| state.frames >= frame);
                        if captured && cfg!(not(target_arch = "wasm32")) {
                            event_loop.exit();
                        }
                    }
                    Err(FrameSkipped::Reconfigure) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(FrameSkipped::Unavailable) => {
                        log::debug!("no surface texture, skipping the frame");
                    }
                }
            }
            _ => {}
        }
    }
}

/// Opens the window and runs the showcase until it is closed.
pub fn run(config: StageConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    #[cfg(all(feature = "integration-tests", target_os = "linux"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(all(feature = "integration-tests", target_os = "windows"))]
    let event_loop: EventLoop<FlowEvent> = {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        winit::event_loop::EventLoop::with_user_event()
            .with_any_thread(true)
            .build()?
    };

    #[cfg(not(feature = "integration-tests"))]
    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;

    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    Ok(())
}
