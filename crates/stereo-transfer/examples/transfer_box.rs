//! Synthetic rig: one camera pair 10 cm apart, a flat scene at constant
//! disparity, and a box carried from the raw left image to the right view.
//!
//! ```text
//! cargo run -p stereo-transfer --example transfer_box -- 12.5
//! ```

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Vector3};
use stereo_transfer::core::{ImageSize, Intrinsics, RectifyingProjection, UndistortCriteria};
use stereo_transfer::geometry::transfer_point;
use stereo_transfer::io::TransferConfig;
use stereo_transfer::pipeline::RawBoxTransfer;
use stereo_transfer::{
    BBox, CameraModel, DisparityMap, PixelPoint, RawLeft, StereoExtrinsics, StereoPair,
    StereoRectification,
};

#[cfg(feature = "tracing")]
use stereo_transfer::core::init_tracing;

const WIDTH: usize = 640;
const HEIGHT: usize = 480;
const BASELINE: f64 = 0.1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);

    let disparity: f32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 16.0,
    };

    let k = Intrinsics::new(512.0, 512.0, 320.0, 240.0)?;
    let camera = CameraModel::pinhole(k);
    let extrinsics = StereoExtrinsics::from_rt(
        Matrix3::identity(),
        Vector3::new(-BASELINE, 0.0, 0.0),
        &k,
        &k,
    )?;

    let mut p_left = Matrix3x4::zeros();
    p_left.fixed_view_mut::<3, 3>(0, 0).copy_from(&k.matrix());
    let mut p_right = p_left;
    p_right[(0, 3)] = -k.fx * BASELINE;
    let rectification = StereoRectification {
        cameras: StereoPair::new(
            RectifyingProjection::new(Matrix3::identity(), p_left),
            RectifyingProjection::new(Matrix3::identity(), p_right),
        ),
        q: Matrix4::identity(),
        image_size: ImageSize::new(WIDTH as u32, HEIGHT as u32),
    };

    let map = DisparityMap::new(WIDTH, HEIGHT, vec![disparity; WIDTH * HEIGHT])?;
    let config = TransferConfig::default();
    let pipeline = RawBoxTransfer::new(&camera, &rectification, &config);

    let raw = BBox::<RawLeft>::new(200.0, 150.0, 120.0, 90.0);
    let out = pipeline.run(&raw, &map)?;
    println!("raw left        {:?}", out.raw_left);
    println!("rectified left  {:?}", out.rectified_left);
    println!("rectified right {:?}", out.rectified_right);
    println!("box disparity   {:.2}", out.transfer.box_disparity);

    // Same scene through depth instead of disparity: Z = f * B / d.
    let depth = k.fx * BASELINE / f64::from(disparity);
    let center = PixelPoint::<RawLeft>::new(260.0, 195.0);
    let moved = transfer_point(
        center,
        &camera,
        &camera,
        &extrinsics,
        depth,
        &UndistortCriteria::default(),
    )?;
    println!("center {center:?} -> {moved:?} at {depth:.3} m");

    Ok(())
}
