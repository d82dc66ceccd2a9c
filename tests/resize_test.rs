#[cfg(feature = "integration-tests")]
mod gpu {
    use std::sync::Arc;

    use vitrine::{StageConfig, context::Context, pipelines::post::ChainExtent};
    use winit::{
        application::ApplicationHandler,
        dpi::PhysicalSize,
        event::WindowEvent,
        event_loop::{ActiveEventLoop, EventLoop},
        window::{Window, WindowId},
    };

    #[derive(Debug, Default)]
    struct Observed {
        initial_matches_window: bool,
        resized: bool,
        aspect: f32,
        surface: (u32, u32),
        extent: Option<ChainExtent>,
        zero_accepted: bool,
        after_zero: (u32, u32),
        aspect_after_zero: f32,
        extent_after_zero: Option<ChainExtent>,
    }

    #[derive(Default)]
    struct ResizeRun {
        observed: Option<anyhow::Result<Observed>>,
    }

    impl ResizeRun {
        fn exercise(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<Observed> {
            let attributes = Window::default_attributes()
                .with_title("vitrine resize")
                .with_inner_size(PhysicalSize::new(320, 240));
            let window = Arc::new(event_loop.create_window(attributes)?);
            let mut ctx = futures::executor::block_on(Context::new(window, &StageConfig::default()))?;

            let size = ctx.window().inner_size();
            let mut observed = Observed {
                initial_matches_window: (ctx.config.width, ctx.config.height)
                    == (size.width.max(1), size.height.max(1)),
                ..Default::default()
            };

            observed.resized = ctx.resize(640, 360);
            observed.aspect = ctx.projection.aspect();
            observed.surface = (ctx.config.width, ctx.config.height);
            observed.extent = Some(ctx.post.extent());

            observed.zero_accepted = ctx.resize(0, 200);
            observed.after_zero = (ctx.config.width, ctx.config.height);
            observed.aspect_after_zero = ctx.projection.aspect();
            observed.extent_after_zero = Some(ctx.post.extent());
            Ok(observed)
        }
    }

    impl ApplicationHandler for ResizeRun {
        fn resumed(&mut self, event_loop: &ActiveEventLoop) {
            if self.observed.is_none() {
                self.observed = Some(self.exercise(event_loop));
            }
            event_loop.exit();
        }

        fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, _: WindowEvent) {}
    }

    #[cfg(target_os = "linux")]
    fn event_loop() -> EventLoop<()> {
        use winit::platform::wayland::EventLoopBuilderExtWayland;

        EventLoop::builder()
            .with_any_thread(true)
            .build()
            .unwrap()
    }

    #[cfg(target_os = "windows")]
    fn event_loop() -> EventLoop<()> {
        use winit::platform::windows::EventLoopBuilderExtWindows;

        EventLoop::builder()
            .with_any_thread(true)
            .build()
            .unwrap()
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    fn event_loop() -> EventLoop<()> {
        EventLoop::new().unwrap()
    }

    #[test]
    fn resize_reaches_projection_surface_and_post_chain() {
        let mut run = ResizeRun::default();
        event_loop().run_app(&mut run).unwrap();

        let observed = run
            .observed
            .expect("the event loop resumed")
            .expect("a GPU context could be created");

        assert!(observed.initial_matches_window);

        assert!(observed.resized);
        assert!((observed.aspect - 640.0 / 360.0).abs() < 1e-6);
        assert_eq!(observed.surface, (640, 360));
        let extent = observed.extent.unwrap();
        assert_eq!(extent.full, (640, 360));
        assert_eq!(extent.half, (320, 180));

        // a minimised window leaves everything as it was
        assert!(!observed.zero_accepted);
        assert_eq!(observed.after_zero, (640, 360));
        assert!((observed.aspect_after_zero - 640.0 / 360.0).abs() < 1e-6);
        assert_eq!(observed.extent_after_zero, Some(extent));
    }
}
