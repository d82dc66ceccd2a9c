use std::time::Duration;

use instant::Instant;
use vitrine::{
    capture::{CAPTURE_FILE_NAME, RowLayout, save_in, to_image, unpad_rows},
    config::BloomSettings,
    data_structures::texture::pack_rgb9e5,
    flow::FrameClock,
    pipelines::post::{BlurStep, ChainExtent, PostParams},
};

mod common;
use common::test_utils::assert_close;

#[test]
fn frame_clock_starts_on_the_first_tick() {
    let mut clock = FrameClock::new();
    assert!(!clock.is_running());

    let start = Instant::now();
    let first = clock.tick_at(start);
    assert!(clock.is_running());
    assert_eq!(first.dt, Duration::ZERO);
    assert_eq!(first.elapsed, Duration::ZERO);

    let second = clock.tick_at(start + Duration::from_millis(16));
    assert_eq!(second.dt, Duration::from_millis(16));

    let third = clock.tick_at(start + Duration::from_millis(50));
    assert_eq!(third.dt, Duration::from_millis(34));
    assert_eq!(third.elapsed, Duration::from_millis(50));
}

#[test]
fn chain_extent_follows_the_viewport() {
    let extent = ChainExtent::for_viewport(1280, 720);
    assert_eq!(extent.full, (1280, 720));
    assert_eq!(extent.half, (640, 360));

    let odd = ChainExtent::for_viewport(3, 1);
    assert_eq!(odd.full, (3, 1));
    assert_eq!(odd.half, (1, 1));
}

#[test]
fn post_params_track_resizes() {
    let bloom = BloomSettings::default();
    let params = PostParams::new(&bloom, 1.0, ChainExtent::for_viewport(800, 400));
    assert_eq!(params.bloom, [0.85, 1.5, 0.4, 1.0]);
    assert_close(params.texel[0], 1.0 / 800.0);
    assert_close(params.texel[3], 1.0 / 200.0);

    let step = BlurStep::new([0.0, 1.0], bloom.radius, ChainExtent::for_viewport(800, 400));
    assert_eq!(step.step[0], 0.0);
    assert_close(step.step[1], 2.6 / 200.0);
}

#[test]
fn readback_rows_are_padded_to_the_copy_alignment() {
    let layout = RowLayout::new(3, 2);
    assert_eq!(layout.unpadded_bytes_per_row, 12);
    assert_eq!(layout.padded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
    assert_eq!(layout.buffer_size(), 2 * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64);

    let aligned = RowLayout::new(64, 1);
    assert_eq!(aligned.padded_bytes_per_row, 256);
}

#[test]
fn unpadding_keeps_only_pixels() {
    let layout = RowLayout::new(2, 2);
    let mut data = vec![0xee; layout.buffer_size() as usize];
    let row = layout.padded_bytes_per_row as usize;
    data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    data[row..row + 8].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);

    let pixels = unpad_rows(&data, &layout);
    assert_eq!(pixels, (1..=16).collect::<Vec<u8>>());

    let image = to_image(&data, &layout).unwrap();
    assert_eq!(image.dimensions(), (2, 2));
    assert_eq!(image.get_pixel(1, 1).0, [13, 14, 15, 16]);
}

#[test]
fn short_readbacks_are_rejected() {
    let layout = RowLayout::new(4, 4);
    assert!(to_image(&[0; 16], &layout).is_err());
}

#[test]
fn saved_frame_keeps_its_size() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RowLayout::new(5, 3);
    let data = vec![128; layout.buffer_size() as usize];
    let image = to_image(&data, &layout).unwrap();

    let path = save_in(&image, dir.path()).unwrap();
    assert_eq!(path.file_name().unwrap(), CAPTURE_FILE_NAME);

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (5, 3));
}

#[test]
fn rgb9e5_packing() {
    assert_eq!(pack_rgb9e5([0.0, 0.0, 0.0]), 0);
    assert_eq!(pack_rgb9e5([f32::NAN, -1.0, 0.0]), 0);

    // 1.0 = 256 * 2^(16 - 15 - 9)
    let one = pack_rgb9e5([1.0, 1.0, 1.0]);
    assert_eq!(one >> 27, 16);
    assert_eq!(one & 0x1ff, 256);
    assert_eq!((one >> 9) & 0x1ff, 256);
    assert_eq!((one >> 18) & 0x1ff, 256);

    // the shared exponent follows the brightest channel
    let mixed = pack_rgb9e5([4.0, 1.0, 0.0]);
    assert_eq!(mixed >> 27, 18);
    assert_eq!(mixed & 0x1ff, 256);
    assert_eq!((mixed >> 9) & 0x1ff, 64);
    assert_eq!((mixed >> 18) & 0x1ff, 0);
}
