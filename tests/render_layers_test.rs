mod common;

use common::test_utils::{
    FakeRasterizer, GpuCall, MemoryDecoder, RecordingGpu, init_logger, registry, solid,
};
use std::cmp::Ordering;

use iso_ngin::{
    Vector2, Vector3,
    data_structures::{
        atlas::{Atlas, LayerAtlas},
        bitmap::RawImage,
        scene_graph::Registry,
    },
    layers::{
        GuiLayer, IsoProjector, IsometricLayer,
        gui::glyph_key,
        iso::{DEPTH_STEP, depth_order},
    },
    render::{LayerStack, Screen},
};

fn screen() -> Screen {
    Screen::new(840.0, 480.0)
}

fn stack(rasterizer: FakeRasterizer) -> LayerStack {
    let mut layers = LayerStack::new();
    layers.push(Box::new(IsometricLayer::new(256, 64.0, 64.0)));
    layers.push(Box::new(GuiLayer::new(256, Box::new(rasterizer), "", 24, screen())));
    layers
}

fn decoder() -> MemoryDecoder {
    MemoryDecoder::default()
        .with("tiles/grass.png", solid(4, 4))
        .with("tiles/water.png", RawImage::solid(4, 4, [0, 0, 255, 255]))
        .with("ui/panel.png", solid(8, 4))
}

fn frame(layers: &mut LayerStack, reg: &Registry, gpu: &mut RecordingGpu, decoder: &MemoryDecoder) {
    layers.render_frame(reg, gpu, decoder, screen());
}

#[test]
fn layers_draw_in_order_between_one_clear_and_one_present() {
    init_logger();
    let mut reg = registry();
    reg.instantiate("tile", "grass", "g", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    let mut layers = stack(FakeRasterizer::default());
    layers
        .layer_mut::<GuiLayer>()
        .unwrap()
        .add_text("hi", 10.0, 10.0, None, None, false);
    assert_eq!(layers.names(), vec!["world", "gui"]);

    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());

    assert_eq!(gpu.calls.first(), Some(&GpuCall::Clear));
    assert_eq!(gpu.calls.last(), Some(&GpuCall::Present));
    assert_eq!(gpu.calls.iter().filter(|c| **c == GpuCall::Clear).count(), 1);
    assert_eq!(gpu.calls.iter().filter(|c| **c == GpuCall::Present).count(), 1);

    let draws: Vec<usize> = gpu
        .calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, GpuCall::Draw { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(draws.len(), 2);
    assert_eq!(gpu.draws[0].1.len(), 6);
    assert_eq!(gpu.draws[1].1.len(), 12);
    assert_eq!(gpu.calls[draws[1] - 1], GpuCall::DepthTest(false));
    assert_eq!(gpu.calls[draws[1] + 1], GpuCall::DepthTest(true));
}

#[test]
fn world_quads_are_sorted_back_to_front_with_decreasing_depth() {
    init_logger();
    let mut reg = registry();
    let positions = [
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
    ];
    for (i, p) in positions.iter().enumerate() {
        reg.instantiate("tile", "grass", &format!("t{}", i), *p).unwrap();
    }
    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());

    let projector = IsoProjector::new(64.0, 64.0, screen());
    let expected_order = [positions[2], positions[1], positions[3], positions[0]];
    let (_, vertices) = &gpu.draws[0];
    assert_eq!(vertices.len(), 24);
    for (k, world) in expected_order.iter().enumerate() {
        let corner = projector.project(*world);
        let (nx, ny) = screen().to_ndc(corner.x, corner.y);
        let first = vertices[k * 6];
        assert_eq!(first.position, [nx, ny, -DEPTH_STEP * k as f32]);
        assert_eq!(first.normal, [0.0, 0.0, 1.0]);
    }
}

#[test]
fn entities_sharing_a_position_are_ordered_by_id() {
    init_logger();
    let mut reg = registry();
    let spot = Vector3::new(1.0, 1.0, 0.0);
    let textures = ["tiles/water.png", "ui/panel.png", "tiles/grass.png"];
    let ids: Vec<u32> = textures
        .iter()
        .enumerate()
        .map(|(i, texture)| {
            let id = reg.instantiate("tile", "grass", &format!("t{}", i), spot).unwrap();
            assert!(reg.set_texture_path(id, texture));
            id
        })
        .collect();

    for a in &ids {
        for b in &ids {
            let order = depth_order(reg.get(*a).unwrap(), reg.get(*b).unwrap());
            assert_eq!(order, a.cmp(b));
            assert!(a == b || order != Ordering::Equal);
        }
    }

    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();
    let mut frames = Vec::new();
    for _ in 0..2 {
        gpu.reset();
        frame(&mut layers, &reg, &mut gpu, &decoder());
        frames.push(gpu.draws[0].1.clone());
    }
    assert_eq!(frames[0], frames[1]);

    let world = layers.layer_mut::<IsometricLayer>().unwrap();
    let vertices = &frames[0];
    assert_eq!(vertices.len(), 18);
    for (k, texture) in textures.iter().enumerate() {
        let uv = world.atlas().uv(texture).unwrap();
        let quad = &vertices[k * 6..k * 6 + 6];
        assert_eq!(quad[0].tex_coords, [uv.u0, uv.v0]);
        assert!(quad.iter().all(|v| v.position[2] == -DEPTH_STEP * k as f32));
    }
    for k in 1..textures.len() {
        assert!(vertices[k * 6].position[2] < vertices[(k - 1) * 6].position[2]);
    }
}

#[test]
fn offscreen_entities_are_culled_relative_to_the_camera() {
    init_logger();
    let mut reg = registry();
    reg.instantiate("tile", "grass", "near", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    reg.instantiate("tile", "grass", "far", Vector3::new(100.0, 100.0, 0.0)).unwrap();
    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();

    frame(&mut layers, &reg, &mut gpu, &decoder());
    let world = layers.layer_mut::<IsometricLayer>().unwrap();
    assert_eq!((world.last_drawn(), world.last_culled()), (1, 1));

    let cam = reg.instantiate("camera", "", "cam", Vector3::new(100.0, 100.0, 0.0)).unwrap();
    reg.set_active_camera(cam);
    frame(&mut layers, &reg, &mut gpu, &decoder());
    let world = layers.layer_mut::<IsometricLayer>().unwrap();
    assert_eq!((world.last_drawn(), world.last_culled()), (1, 1));
    let (_, vertices) = gpu.draws.last().unwrap();
    let (nx, ny) = screen().to_ndc(420.0, 240.0);
    assert_eq!(&vertices[0].position[..2], &[nx, ny]);
}

#[test]
fn touching_the_viewport_edge_is_visible() {
    let projector = IsoProjector::new(64.0, 64.0, screen());
    assert!(projector.is_on_screen(Vector2::new(-64.0, 0.0)));
    assert!(projector.is_on_screen(Vector2::new(840.0, 480.0)));
    assert!(!projector.is_on_screen(Vector2::new(-64.5, 0.0)));
    assert!(!projector.is_on_screen(Vector2::new(0.0, 480.5)));
}

#[test]
fn undecodable_textures_become_magenta_placeholders() {
    init_logger();
    let mut reg = registry();
    let id = reg.instantiate("tile", "grass", "g", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    reg.set_texture_path(id, "tiles/missing.png");
    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();
    let decoder = decoder();
    frame(&mut layers, &reg, &mut gpu, &decoder);

    assert_eq!(decoder.requests.borrow().as_slice(), ["tiles/missing.png"]);
    let (texture, _) = gpu.draws[0];
    let pixels = &gpu.atlases[&texture];
    assert_eq!(&pixels[..4], &RawImage::MAGENTA);

    frame(&mut layers, &reg, &mut gpu, &decoder);
    assert_eq!(decoder.requests.borrow().len(), 1);
}

#[test]
fn atlas_overflow_skips_and_reports() {
    init_logger();
    let tiles: Vec<RawImage> = (0..4).map(|_| solid(4, 4)).collect();
    let keys = ["a", "b", "c", "d"];
    let atlas = Atlas::pack(8, keys.iter().copied().zip(tiles.iter()));
    assert_eq!(atlas.len(), 1);
    assert_eq!(atlas.skipped(), &["b", "c", "d"]);

    let huge = solid(16, 1);
    let atlas = Atlas::pack(16, [("huge", &huge), ("small", &tiles[0])]);
    assert_eq!(atlas.skipped(), &["huge"]);
    assert!(atlas.uv("small").is_some());
}

#[test]
fn packed_rectangles_stay_inside_and_never_overlap() {
    init_logger();
    let images: Vec<(String, RawImage)> = (0..40)
        .map(|i| (format!("img{}", i), solid(3 + (i * 7) % 13, 2 + (i * 5) % 11)))
        .collect();
    let atlas = Atlas::pack(64, images.iter().map(|(k, img)| (k.as_str(), img)));
    assert!(!atlas.is_empty());

    let rects: Vec<_> = images
        .iter()
        .filter_map(|(k, _)| atlas.uv(k))
        .collect();
    assert_eq!(rects.len() + atlas.skipped().len(), images.len());
    for (i, a) in rects.iter().enumerate() {
        assert!(a.u0 >= 0.0 && a.v0 >= 0.0 && a.u1 <= 1.0 && a.v1 <= 1.0);
        for b in rects.iter().skip(i + 1) {
            let apart = a.u1 <= b.u0 || b.u1 <= a.u0 || a.v1 <= b.v0 || b.v1 <= a.v0;
            assert!(apart, "{:?} overlaps {:?}", a, b);
        }
    }
}

#[test]
fn layer_atlas_rebuild_releases_the_old_texture() {
    init_logger();
    let mut atlas = LayerAtlas::new(32);
    let mut gpu = RecordingGpu::new();
    atlas.ensure_image_loaded("", &MemoryDecoder::default());
    atlas.ensure_current(&mut gpu);
    let first = atlas.texture().unwrap();
    assert_eq!(atlas.raw("").unwrap().pixel(0, 0), Some(RawImage::WHITE));

    atlas.ensure_current(&mut gpu);
    assert_eq!(gpu.uploads(), 1);

    atlas.insert_raw("more", solid(2, 2));
    assert!(atlas.is_dirty());
    atlas.ensure_current(&mut gpu);
    assert_eq!(gpu.uploads(), 2);
    assert!(gpu.calls.contains(&GpuCall::Release(first)));
    assert_ne!(atlas.texture(), Some(first));
}

#[test]
fn text_glyphs_are_placed_on_the_baseline() {
    init_logger();
    let reg = Registry::default();
    let rasterizer = FakeRasterizer::default();
    let mut layers = stack(rasterizer.clone());
    layers
        .layer_mut::<GuiLayer>()
        .unwrap()
        .add_text("a b", 10.0, 20.0, None, None, false);
    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());

    assert_eq!(rasterizer.rasterized.borrow().len(), 3);
    let (_, vertices) = gpu.draws.last().unwrap();
    assert_eq!(vertices.len(), 12);
    // baseline 20 + 24, bearing 24: the glyph top sits at y = 20
    let (ax, ay) = screen().to_ndc(10.0, 20.0);
    assert_eq!(&vertices[0].position[..2], &[ax, ay]);
    // 'a' and ' ' both advance by 12
    let (bx, by) = screen().to_ndc(34.0, 20.0);
    assert_eq!(&vertices[6].position[..2], &[bx, by]);
    let (ex, ey) = screen().to_ndc(46.0, 44.0);
    assert_eq!(&vertices[8].position[..2], &[ex, ey]);
}

#[test]
fn transient_entries_last_one_frame_and_persistent_ones_stay() {
    init_logger();
    let reg = Registry::default();
    let mut layers = stack(FakeRasterizer::default());
    {
        let gui = layers.layer_mut::<GuiLayer>().unwrap();
        gui.add_text("fps", 0.0, 0.0, None, None, false);
        gui.add_text_at_ndc("score", 0.0, 0.0, None, Some(12), true);
        assert_eq!(gui.entries()[1].x, 420.0);
        assert_eq!(gui.entries()[1].y, 240.0);
    }
    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());

    let gui = layers.layer_mut::<GuiLayer>().unwrap();
    assert_eq!(gui.entries().len(), 1);
    assert_eq!(gui.entries()[0].text, "score");
    gui.clear_entries();
    assert!(gui.entries().is_empty());
}

#[test]
fn only_new_glyphs_trigger_an_atlas_rebuild() {
    init_logger();
    let reg = Registry::default();
    let rasterizer = FakeRasterizer::default();
    let mut layers = stack(rasterizer.clone());
    let mut gpu = RecordingGpu::new();
    let decoder = decoder();

    layers
        .layer_mut::<GuiLayer>()
        .unwrap()
        .add_text("abc", 0.0, 0.0, None, None, true);
    frame(&mut layers, &reg, &mut gpu, &decoder);
    let uploads = gpu.uploads();
    let rasterized = rasterizer.rasterized.borrow().len();

    frame(&mut layers, &reg, &mut gpu, &decoder);
    assert_eq!(gpu.uploads(), uploads);
    assert_eq!(rasterizer.rasterized.borrow().len(), rasterized);

    layers
        .layer_mut::<GuiLayer>()
        .unwrap()
        .add_text("abd", 0.0, 30.0, None, None, false);
    frame(&mut layers, &reg, &mut gpu, &decoder);
    assert_eq!(gpu.uploads(), uploads + 1);
    assert_eq!(rasterizer.rasterized.borrow().len(), rasterized + 1);

    layers.layer_mut::<GuiLayer>().unwrap().set_font("other.ttf", 24);
    frame(&mut layers, &reg, &mut gpu, &decoder);
    assert_eq!(
        rasterizer.rasterized.borrow().last().map(|(f, _, _)| f.as_str()),
        Some("other.ttf")
    );
}

#[test]
fn switching_fonts_drops_the_old_glyph_bitmaps() {
    init_logger();
    let reg = Registry::default();
    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();
    let decoder = decoder();
    let gui = layers.layer_mut::<GuiLayer>().unwrap();
    gui.add_text("ab", 0.0, 0.0, None, None, true);
    frame(&mut layers, &reg, &mut gpu, &decoder);

    let gui = layers.layer_mut::<GuiLayer>().unwrap();
    assert!(gui.atlas().contains(&glyph_key("", 24, 'a')));
    gui.set_font("other.ttf", 24);
    assert!(!gui.atlas().contains(&glyph_key("", 24, 'a')));
    assert!(!gui.atlas().contains(&glyph_key("", 24, 'b')));

    frame(&mut layers, &reg, &mut gpu, &decoder);
    let gui = layers.layer_mut::<GuiLayer>().unwrap();
    let atlas = gui.atlas().atlas().unwrap();
    assert_eq!(atlas.len(), 2);
    assert!(atlas.uv(&glyph_key("other.ttf", 24, 'a')).is_some());
    assert!(atlas.uv(&glyph_key("", 24, 'a')).is_none());
}

#[test]
fn failing_fonts_do_not_stop_the_frame() {
    init_logger();
    let reg = Registry::default();
    let mut layers = stack(FakeRasterizer::default());
    layers
        .layer_mut::<GuiLayer>()
        .unwrap()
        .add_text("oops", 0.0, 0.0, Some("broken.ttf"), None, false);
    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());
    assert_eq!(gpu.calls.last(), Some(&GpuCall::Present));
    assert!(gpu.draw_calls().is_empty());
}

#[test]
fn ui_images_and_text_entities_are_drawn_in_screen_space() {
    init_logger();
    let mut reg = registry();
    reg.prototypes_mut()
        .load_str(r#"{"objects":[{"obj_class":"ui","textures":"ui/panel.png","properties":{"sx":5,"sy":6}}]}"#)
        .unwrap();
    reg.instantiate("ui", "", "panel", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    reg.instantiate("ui", "text", "label", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    reg.instantiate("tile", "grass", "g", Vector3::new(0.0, 0.0, 0.0)).unwrap();

    let mut layers = stack(FakeRasterizer::default());
    let mut gpu = RecordingGpu::new();
    frame(&mut layers, &reg, &mut gpu, &decoder());

    // the world layer ignores ui entities
    assert_eq!(gpu.draws[0].1.len(), 6);
    let (_, gui) = gpu.draws.last().unwrap();
    assert_eq!(gui.len(), 6 + 5 * 6);
    let (x0, y0) = screen().to_ndc(5.0, 6.0);
    let (x1, y1) = screen().to_ndc(13.0, 10.0);
    assert_eq!(&gui[0].position[..2], &[x0, y0]);
    assert_eq!(&gui[2].position[..2], &[x1, y1]);
    let (tx, ty) = screen().to_ndc(10.0, 20.0);
    assert_eq!(&gui[6].position[..2], &[tx, ty]);
}
