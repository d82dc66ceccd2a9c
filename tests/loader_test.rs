use std::{cell::RefCell, rc::Rc, sync::Arc};

use futures::{
    executor::{LocalPool, block_on},
    task::LocalSpawnExt,
};
use vitrine::{
    ModelLoader, PlacementMode, RingLayout, Variant,
    data_structures::scene_graph::{Scene, SharedScene},
};

mod common;
use common::test_utils::{FakeDecoder, assert_close, showcase_model};

fn loader(decoder: FakeDecoder, mode: PlacementMode) -> (ModelLoader, SharedScene) {
    let scene: SharedScene = Rc::new(RefCell::new(Scene::new()));
    let loader = ModelLoader::new(
        Rc::new(decoder),
        scene.clone(),
        Variant::Showcase.material_rule(),
        mode,
    );
    (loader, scene)
}

#[test]
fn repeated_loads_reuse_the_cached_model() {
    let decoder = FakeDecoder::succeeding(showcase_model());
    let calls = decoder.calls();
    let (loader, scene) = loader(decoder, PlacementMode::Single);

    let first = block_on(loader.load_model("case.glb")).expect("first load");
    let second = block_on(loader.load_model("case.glb")).expect("second load");
    let third = block_on(loader.load_model("case.glb")).expect("third load");

    assert_eq!(calls.get(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert!(Arc::ptr_eq(&first, &loader.cache().get("case.glb").unwrap()));

    // single mode re-attaches the one copy
    let scene = scene.borrow();
    assert_eq!(scene.placements().len(), 1);
    assert_eq!(scene.instance_count(), 1);
}

#[test]
fn different_paths_are_cached_separately() {
    let decoder = FakeDecoder::succeeding(showcase_model());
    let calls = decoder.calls();
    let (loader, scene) = loader(decoder, PlacementMode::Single);

    let a = block_on(loader.load_model("a.glb")).unwrap();
    let b = block_on(loader.load_model("b.glb")).unwrap();

    assert_eq!(calls.get(), 2);
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(loader.cache().len(), 2);
    assert_eq!(scene.borrow().placements().len(), 2);
}

#[test]
fn ring_spawns_six_turned_and_stacked_copies_per_load() {
    let decoder = FakeDecoder::succeeding(showcase_model());
    let calls = decoder.calls();
    let (loader, scene) = loader(decoder, PlacementMode::Ring(RingLayout::default()));

    block_on(loader.load_model("case.glb")).unwrap();
    {
        let scene = scene.borrow();
        let instances = &scene.placements()[0].instances;
        assert_eq!(instances.len(), 6);

        for (i, instance) in instances.iter().enumerate() {
            let expected = i as f32 * 60.0;
            let diff = (instance.yaw().0 - expected).rem_euclid(360.0);
            assert!(diff < 1e-3 || diff > 360.0 - 1e-3, "copy {i} turned by {:?}", instance.yaw());
            assert_close(instance.scale.x, 0.5);
        }

        let mut heights: Vec<f32> = instances.iter().map(|i| i.position.y).collect();
        heights.sort_by(f32::total_cmp);
        heights.dedup();
        assert_eq!(heights.len(), 6);
    }

    block_on(loader.load_model("case.glb")).unwrap();
    assert_eq!(scene.borrow().instance_count(), 12);
    assert_eq!(scene.borrow().placements().len(), 1);
    assert_eq!(calls.get(), 1);
}

#[test]
fn failed_decode_leaves_scene_and_cache_untouched() {
    let decoder = FakeDecoder::failing();
    let calls = decoder.calls();
    let (loader, scene) = loader(decoder, PlacementMode::Ring(RingLayout::default()));
    let revision = scene.borrow().revision();

    assert!(block_on(loader.load_model("broken.glb")).is_none());

    assert!(loader.cache().is_empty());
    assert!(!loader.cache().is_pending("broken.glb"));
    assert!(scene.borrow().placements().is_empty());
    assert_eq!(scene.borrow().revision(), revision);

    // nothing was remembered, so the next request tries again
    assert!(block_on(loader.load_model("broken.glb")).is_none());
    assert_eq!(calls.get(), 2);
}

#[test]
fn concurrent_loads_share_one_decode() {
    let (decoder, release) = FakeDecoder::succeeding(showcase_model()).gated();
    let calls = decoder.calls();
    let (loader, scene) = loader(decoder, PlacementMode::Single);
    let loader = Rc::new(loader);

    let mut pool = LocalPool::new();
    let results = Rc::new(RefCell::new(Vec::new()));
    for _ in 0..2 {
        let loader = loader.clone();
        let results = results.clone();
        pool.spawner()
            .spawn_local(async move {
                let model = loader.load_model("case.glb").await;
                results.borrow_mut().push(model);
            })
            .unwrap();
    }

    pool.run_until_stalled();
    assert_eq!(calls.get(), 1);
    assert!(loader.cache().is_pending("case.glb"));
    assert!(results.borrow().is_empty());
    assert_eq!(scene.borrow().instance_count(), 0);

    release.send(()).unwrap();
    pool.run_until_stalled();

    let results = results.borrow();
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert!(Arc::ptr_eq(first, second));
    assert_eq!(calls.get(), 1);
    assert_eq!(scene.borrow().placements().len(), 1);
    assert_eq!(scene.borrow().instance_count(), 1);
}

#[test]
fn first_placement_is_fitted_to_the_extent() {
    let decoder = FakeDecoder::succeeding(showcase_model());
    let (loader, scene) = loader(decoder, PlacementMode::Single);
    let loader = loader.with_fit_extent(Some(5.0));

    block_on(loader.load_model("case.glb")).unwrap();

    // the model spans y -0.5..2.0, so 2.5 is its largest side
    let scene = scene.borrow();
    let base = scene.placements()[0].base;
    assert_close(base.scale.x, 2.0);
    assert_close(base.position.x, 0.0);
    assert_close(base.position.y, -0.75 * 2.0);
    assert_close(base.position.z, 0.0);

    let fitted = scene.placements()[0]
        .model
        .bounds()
        .unwrap()
        .transformed(&base);
    assert_close(fitted.center().y, 0.0);
    assert_close(fitted.size().y, 5.0);
}

#[test]
fn debug_output_reports_the_cache_state() {
    let (decoder, release) = FakeDecoder::succeeding(showcase_model()).gated();
    let (loader, _scene) = loader(decoder, PlacementMode::Single);
    let loader = Rc::new(loader);

    let mut pool = LocalPool::new();
    let task = loader.clone();
    pool.spawner()
        .spawn_local(async move {
            task.load_model("case.glb").await;
        })
        .unwrap();

    pool.run_until_stalled();
    let loading = format!("{loader:?}");
    assert!(loading.starts_with("ModelLoader"));
    assert!(loading.contains("ready: 0, pending: 1"));
    assert!(loading.contains("mode: Single"));

    release.send(()).unwrap();
    pool.run_until_stalled();
    assert!(format!("{:?}", loader.cache()).contains("ready: 1, pending: 0"));
}
