use std::path::PathBuf;
use std::rc::Rc;

use meshview::{
    ColorGenerator, GpuContext, LoggingConfig, Mesh, MeshData, Result, Vec3, View, ViewConfig,
    import_file, init_logging,
};

/// Degrees per second of the model's spin.
const SPIN_RATE: f32 = 30.0;
/// Degrees per second of the satellite around the model.
const ORBIT_RATE: f32 = 90.0;

fn main() {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args_os().skip(1).map(PathBuf::from);
    let mut config = ViewConfig::new();
    if let Some(model) = args.next() {
        config = config.model(model);
    }
    if let Some(skybox) = args.next() {
        config = config.skybox(skybox);
    }

    let model_path = config.model_path.clone();
    let policy = config.import_policy;
    let seed = config.color_seed;

    let result = meshview::run(config, move |gpu, view| {
        let mut colors = ColorGenerator::new(seed);
        let (data, bounds) = match &model_path {
            Some(path) => {
                let imported = import_file(path, policy)?;
                let bounds = imported.bounds();
                (MeshData::from_import(imported, &mut colors)?, bounds)
            }
            None => {
                log::info!("no model given, showing the built-in cube");
                (MeshData::cube("cube", &mut colors), (Vec3::splat(-1.0), Vec3::ONE))
            }
        };
        let model = Rc::new(Mesh::upload(gpu, &data));
        build_scene(gpu, view, model, bounds, &mut colors)
    });

    if let Err(err) = result {
        log::error!("{err}");
        std::process::exit(1);
    }
}

/// root → pivot → { model, arm → satellite }
///
/// The pivot spins the model and carries the arm along. The satellite is a
/// small translucent cube that orbits at the end of the arm. The model is
/// centered and scaled from its `bounds` to fill the -1..1 cube, so any file
/// sits inside the satellite's orbit.
fn build_scene(
    gpu: &GpuContext,
    view: &mut View,
    model: Rc<Mesh>,
    bounds: (Vec3, Vec3),
    colors: &mut ColorGenerator,
) -> Result<()> {
    let satellite_mesh = Rc::new(Mesh::upload(gpu, &MeshData::cube("satellite", colors)));

    let scene = view.scene_mut();
    let root = scene.root();
    let pivot = scene.create_node();
    let body = scene.create_mesh_node(model);
    let arm = scene.create_node();
    let satellite = scene.create_mesh_node(satellite_mesh);

    scene.add_child(root, pivot)?;
    scene.add_child(pivot, body)?;
    scene.add_child(pivot, arm)?;
    scene.add_child(arm, satellite)?;

    let (min, max) = bounds;
    let extent = (max - min).max_element();
    let fit = if extent > 0.0 { 2.0 / extent } else { 1.0 };
    scene.scale(body, Vec3::splat(fit));
    scene.translate(body, -(min + max) * 0.5);

    scene.translate(satellite, Vec3::new(3.0, 0.0, 0.0));
    scene.scale(satellite, Vec3::splat(0.3));
    scene.set_opacity(satellite, 0.5);

    view.on_update(move |scene, dt| {
        scene.rotate(pivot, SPIN_RATE * dt, Vec3::Y);
        scene.rotate(arm, (ORBIT_RATE - SPIN_RATE) * dt, Vec3::Y);
    });
    Ok(())
}
