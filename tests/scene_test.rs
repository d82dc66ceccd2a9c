use std::sync::Arc;

use cgmath::Vector3;
use vitrine::{
    StageConfig, Variant,
    config::configure_scene,
    data_structures::{
        instance::Instance,
        light::{Light, LightUniform, MAX_SPOT_LIGHTS, LightSpec, hex_color, studio_rig},
        scene_graph::{Scene, SceneNode},
    },
    render::back_to_front,
    resources::loader::{PlacementMode, RingLayout},
};

mod common;
use common::test_utils::{assert_close, showcase_model};

#[test]
fn attaching_twice_keeps_one_copy() {
    let mut scene = Scene::new();
    let model = Arc::new(showcase_model());
    scene.attach(&model);
    let revision = scene.revision();
    scene.attach(&model);

    assert_eq!(scene.instance_count(), 1);
    assert_eq!(scene.revision(), revision);
}

#[test]
fn placement_copies_compose_with_the_base() {
    let mut scene = Scene::new();
    let model = Arc::new(showcase_model());
    scene.set_base(&model, Instance::new().with_uniform_scale(2.0));
    scene.spawn(&model, [Instance::from(Vector3::new(1.0, 0.0, 0.0))]);

    let world = scene.placements()[0].world_instances();
    assert_eq!(world.len(), 1);
    assert_close(world[0].scale.x, 2.0);
    assert_close(world[0].position.x, 1.0);
}

#[test]
fn studio_rig_has_three_spots_and_an_ambient() {
    let rig = studio_rig();
    let spots = rig.iter().filter(|l| matches!(l, Light::Spot(_))).count();
    assert_eq!(spots, 3);
    assert!(matches!(rig.last(), Some(Light::Ambient { .. })));
}

#[test]
fn configure_scene_adds_lights_and_environment() {
    let config = StageConfig::default();
    let mut scene = Scene::new();
    configure_scene(&config, &mut scene);

    assert_eq!(scene.nodes().len(), 4);
    assert_eq!(scene.environment(), Some("paint.png"));

    let lights = scene.lights();
    let (_, key_position) = lights
        .iter()
        .find(|(light, _)| matches!(light, Light::Spot(spec) if spec.intensity == 50.0))
        .expect("key light");
    assert_eq!(*key_position, Vector3::new(10.0, 5.0, 0.0));
}

#[test]
fn light_uniform_counts_spots_and_caps_them() {
    let scene_lights = studio_rig();
    let positioned: Vec<_> = scene_lights
        .iter()
        .map(|light| match light {
            Light::Spot(spec) => (light, spec.position),
            Light::Ambient { .. } => (light, Vector3::new(0.0, 0.0, 0.0)),
        })
        .collect();
    assert_eq!(LightUniform::pack(positioned.iter().copied()).spot_count(), 3);

    let spot = Light::Spot(LightSpec {
        color: [1.0; 3],
        position: Vector3::new(0.0, 1.0, 0.0),
        intensity: 1.0,
        angle: 0.5,
        penumbra: 0.0,
        decay: 2.0,
    });
    let crowd = vec![(&spot, Vector3::new(0.0, 1.0, 0.0)); MAX_SPOT_LIGHTS + 3];
    assert_eq!(LightUniform::pack(crowd).spot_count(), MAX_SPOT_LIGHTS);
}

#[test]
fn hex_colors_are_linearised() {
    for channel in hex_color(0xffffff) {
        assert_close(channel, 1.0);
    }
    assert_eq!(hex_color(0x000000), [0.0, 0.0, 0.0]);
    let grey = hex_color(0x404040);
    assert!(grey[0] < 0.25 && grey[0] > 0.04);
}

#[test]
fn variants_choose_rule_and_placement() {
    assert_eq!(Variant::default(), Variant::Showcase);
    assert_eq!(Variant::Showcase.placement_mode(), PlacementMode::Single);
    assert_eq!(Variant::Uniform.placement_mode(), PlacementMode::Single);
    assert!(matches!(
        Variant::Carousel.placement_mode(),
        PlacementMode::Ring(layout) if layout.count == 6
    ));

    let carousel = StageConfig::default().with_variant(Variant::Carousel);
    assert_eq!(carousel.variant, Variant::Carousel);
    assert_eq!(carousel.model_path, StageConfig::default().model_path);
}

#[test]
fn unattended_capture_counts_frames_from_one() {
    let capture = |frames| StageConfig {
        capture_after_frames: frames,
        ..Default::default()
    };
    assert_eq!(StageConfig::default().capture_frame(), None);
    assert_eq!(capture(Some(0)).capture_frame(), Some(1));
    assert_eq!(capture(Some(1)).capture_frame(), Some(1));
    assert_eq!(capture(Some(3)).capture_frame(), Some(3));
}

#[test]
fn scene_lights_follow_their_parents() {
    let mut scene = Scene::new();
    let spot = studio_rig()[0];
    let mut rig = SceneNode::group("rig").with_local(Instance::from(Vector3::new(0.0, 2.0, 0.0)));
    rig.add_child(SceneNode::light("key", spot));
    scene.add_node(rig);

    let lights = scene.lights();
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].1, Vector3::new(10.0, 7.0, 0.0));
}

#[test]
fn transparent_copies_are_drawn_furthest_first() {
    let copies = RingLayout::default().instances();
    let eye = Vector3::new(0.0, 0.0, 10.0);
    // off-center so each turn moves the copy around the ring
    let local_center = Vector3::new(1.0, 0.0, 0.0);

    let sorted = back_to_front(&copies, local_center, eye);
    assert_eq!(sorted.len(), copies.len());

    // copy i sits at height i * 0.5
    let heights: Vec<f32> = sorted.iter().map(|copy| copy.position.y).collect();
    let expected = [1.0, 0.5, 1.5, 0.0, 2.5, 2.0];
    for (height, expected) in heights.iter().zip(expected) {
        assert_close(*height, expected);
    }
}
