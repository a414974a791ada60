use std::{
    error::Error,
    path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use nalgebra::Point2;
use serde::Serialize;
use stereo_transfer::charuco::{match_frame, MarkerObservations};
use stereo_transfer::core::{
    BBox, CameraModel, ImageSize, PixelPoint, PixelSpace, RawLeft, RawRight, RawSpace,
    StereoExtrinsics, StereoPair,
};
use stereo_transfer::disparity_io::load_sgbm_png;
use stereo_transfer::geometry::{
    epipolar_line, transfer_bbox_detailed, transfer_point, warp_bbox_raw_to_rectified,
};
use stereo_transfer::io::{
    CameraCalibrationDoc, JsonDocument, RectificationDoc, StereoCalibrationDoc, TransferConfig,
};
use stereo_transfer::pipeline::RawBoxTransfer;

/// Cross-view geometric transfer for a calibrated two-camera rig.
#[derive(Debug, Parser)]
#[command(author, version, about = "Transfer points and boxes between stereo views")]
struct Cli {
    /// Optional JSON TransferConfig. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted tracing output.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Move a raw pixel of camera A into camera B at the assumed depth.
    Point(PointArgs),
    /// Epipolar line in camera B of a camera A pixel.
    Epiline(EpilineArgs),
    /// Warp a raw box into the rectified view of the same camera.
    WarpBbox(WarpArgs),
    /// Transfer a rectified-left box into the rectified-right view.
    TransferBbox(TransferArgs),
    /// Intersect two marker observation files.
    Match(MatchArgs),
}

#[derive(Debug, Args)]
struct PointArgs {
    /// Camera A calibration JSON.
    #[arg(long)]
    camera_a: PathBuf,
    /// Camera B calibration JSON.
    #[arg(long)]
    camera_b: PathBuf,
    /// Stereo calibration JSON (A -> B).
    #[arg(long)]
    stereo: PathBuf,
    #[arg(long, allow_hyphen_values = true)]
    x: f64,
    #[arg(long, allow_hyphen_values = true)]
    y: f64,
    /// Scene depth; overrides `assumed_depth` from the config.
    #[arg(long)]
    depth: Option<f64>,
    /// Treat the pixel as camera B and transfer it into camera A.
    #[arg(long)]
    reverse: bool,
}

#[derive(Debug, Args)]
struct EpilineArgs {
    /// Stereo calibration JSON holding the fundamental matrix.
    #[arg(long)]
    stereo: PathBuf,
    #[arg(long, allow_hyphen_values = true)]
    x: f64,
    #[arg(long, allow_hyphen_values = true)]
    y: f64,
    /// Line in camera A for a camera B pixel.
    #[arg(long)]
    reverse: bool,
    /// Target image size `WIDTH HEIGHT`, to report drawable end points.
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    image_size: Option<Vec<u32>>,
}

#[derive(Debug, Args)]
struct WarpArgs {
    /// Raw camera calibration JSON.
    #[arg(long)]
    camera: PathBuf,
    /// Rectification JSON.
    #[arg(long)]
    rectification: PathBuf,
    /// Box `X Y W H` in raw pixels.
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"], allow_hyphen_values = true)]
    bbox: Vec<f64>,
    /// The box belongs to the right camera.
    #[arg(long)]
    right: bool,
}

#[derive(Debug, Args)]
struct TransferArgs {
    /// 16-bit fixed-point disparity PNG of the current frame pair.
    #[arg(long)]
    disparity: PathBuf,
    /// Box `X Y W H`; rectified left unless `--raw-camera` is given.
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"], allow_hyphen_values = true)]
    bbox: Vec<f64>,
    /// Left camera calibration JSON; the box is then raw left and is warped first.
    #[arg(long, requires = "rectification")]
    raw_camera: Option<PathBuf>,
    /// Rectification JSON, required with `--raw-camera`.
    #[arg(long)]
    rectification: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct MatchArgs {
    /// Camera A observations: JSON list of `{"id", "x", "y"}`.
    #[arg(long)]
    left: PathBuf,
    /// Camera B observations.
    #[arg(long)]
    right: PathBuf,
}

#[derive(Serialize)]
struct PointReport {
    space: &'static str,
    x: f64,
    y: f64,
    depth: f64,
}

#[derive(Serialize)]
struct EpilineReport {
    space: &'static str,
    a: f64,
    b: f64,
    c: f64,
    vertical: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    segment: Option<[[f64; 2]; 2]>,
}

#[derive(Serialize)]
#[serde(bound = "")]
struct BoxReport<S: PixelSpace> {
    space: &'static str,
    bbox: BBox<S>,
}

#[derive(Serialize)]
struct MatchReport {
    ids: Vec<u32>,
    left: Vec<[f64; 2]>,
    right: Vec<[f64; 2]>,
    object_points: Vec<[f64; 3]>,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => TransferConfig::load_json(path)?,
        None => TransferConfig::default(),
    };

    let json = match &cli.command {
        Command::Point(args) => run_point(args, &config)?,
        Command::Epiline(args) => run_epiline(args)?,
        Command::WarpBbox(args) => run_warp(args, &config)?,
        Command::TransferBbox(args) => run_transfer(args, &config)?,
        Command::Match(args) => run_match(args, &config)?,
    };
    println!("{json}");
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    tracing_log::LogTracer::init()?;
    stereo_transfer::core::init_tracing(cli.log_json);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let level = stereo_transfer::core::level_from_verbosity(cli.verbose);
    stereo_transfer::core::init_with_level(level)?;
    Ok(())
}

fn load_camera(path: &Path) -> Result<CameraModel, Box<dyn Error>> {
    Ok(CameraCalibrationDoc::load_json(path)?.to_camera_model()?)
}

fn load_extrinsics(path: &Path) -> Result<StereoExtrinsics, Box<dyn Error>> {
    Ok(StereoCalibrationDoc::load_json(path)?.to_extrinsics()?)
}

fn bbox_from<S: PixelSpace>(v: &[f64]) -> Result<BBox<S>, Box<dyn Error>> {
    match v {
        [x, y, w, h] => Ok(BBox::new(*x, *y, *w, *h)),
        _ => Err(format!("--bbox takes 4 values, got {}", v.len()).into()),
    }
}

fn point_in<A: RawSpace>(
    args: &PointArgs,
    cameras: StereoPair<&CameraModel>,
    extrinsics: &StereoExtrinsics,
    depth: f64,
    config: &TransferConfig,
) -> Result<String, Box<dyn Error>> {
    let out = transfer_point(
        PixelPoint::<A>::new(args.x, args.y),
        cameras.left,
        cameras.right,
        extrinsics,
        depth,
        &config.undistort,
    )?;
    Ok(serde_json::to_string_pretty(&PointReport {
        space: <A::Counterpart as PixelSpace>::NAME,
        x: out.x,
        y: out.y,
        depth,
    })?)
}

fn run_point(args: &PointArgs, config: &TransferConfig) -> Result<String, Box<dyn Error>> {
    let a = load_camera(&args.camera_a)?;
    let b = load_camera(&args.camera_b)?;
    let ext = load_extrinsics(&args.stereo)?;
    let depth = args.depth.unwrap_or(config.assumed_depth);
    if args.reverse {
        point_in::<RawRight>(args, StereoPair::new(&b, &a), &ext.inverse(), depth, config)
    } else {
        point_in::<RawLeft>(args, StereoPair::new(&a, &b), &ext, depth, config)
    }
}

fn epiline_in<A: RawSpace>(
    args: &EpilineArgs,
    extrinsics: &StereoExtrinsics,
) -> Result<String, Box<dyn Error>> {
    let pixel = PixelPoint::<A>::new(args.x, args.y);
    let line = epipolar_line(pixel, &extrinsics.fundamental)
        .ok_or("pixel lies on the epipole, no line defined")?;
    let segment = match args.image_size.as_deref() {
        Some([w, h]) => {
            let (p0, p1) = line.segment_across(ImageSize::new(*w, *h));
            Some([[p0.x, p0.y], [p1.x, p1.y]])
        }
        _ => None,
    };
    Ok(serde_json::to_string_pretty(&EpilineReport {
        space: <A::Counterpart as PixelSpace>::NAME,
        a: line.a,
        b: line.b,
        c: line.c,
        vertical: line.is_vertical(),
        segment,
    })?)
}

fn run_epiline(args: &EpilineArgs) -> Result<String, Box<dyn Error>> {
    let ext = load_extrinsics(&args.stereo)?;
    if args.reverse {
        epiline_in::<RawRight>(args, &ext.inverse())
    } else {
        epiline_in::<RawLeft>(args, &ext)
    }
}

fn warp_in<S: RawSpace>(
    args: &WarpArgs,
    camera: &CameraModel,
    rect: &RectificationDoc,
    config: &TransferConfig,
) -> Result<String, Box<dyn Error>> {
    let rectification = rect.to_rectification();
    let bbox = bbox_from::<S>(&args.bbox)?;
    let bounds = config.clip_to_image.then_some(rectification.image_size);
    let out = warp_bbox_raw_to_rectified(
        &bbox,
        camera,
        rectification.camera(S::ROLE),
        bounds,
        &config.warp,
    )?;
    Ok(serde_json::to_string_pretty(&BoxReport {
        space: <S::Rectified as PixelSpace>::NAME,
        bbox: out,
    })?)
}

fn run_warp(args: &WarpArgs, config: &TransferConfig) -> Result<String, Box<dyn Error>> {
    let camera = load_camera(&args.camera)?;
    let rect = RectificationDoc::load_json(&args.rectification)?;
    if args.right {
        warp_in::<RawRight>(args, &camera, &rect, config)
    } else {
        warp_in::<RawLeft>(args, &camera, &rect, config)
    }
}

fn run_transfer(args: &TransferArgs, config: &TransferConfig) -> Result<String, Box<dyn Error>> {
    let disparity = load_sgbm_png(&args.disparity)?;
    match (&args.raw_camera, &args.rectification) {
        (Some(camera), Some(rect)) => {
            let camera = load_camera(camera)?;
            let rectification = RectificationDoc::load_json(rect)?.to_rectification();
            let pipeline = RawBoxTransfer::new(&camera, &rectification, config);
            let out = pipeline.run(&bbox_from(&args.bbox)?, &disparity)?;
            Ok(serde_json::to_string_pretty(&out)?)
        }
        _ => {
            let bbox = bbox_from(&args.bbox)?;
            let out = transfer_bbox_detailed(&bbox, &disparity, &config.disparity)?;
            Ok(serde_json::to_string_pretty(&out)?)
        }
    }
}

fn run_match(args: &MatchArgs, config: &TransferConfig) -> Result<String, Box<dyn Error>> {
    let board = config.build_board()?;
    let left = MarkerObservations::load_json(&args.left)?;
    let right = MarkerObservations::load_json(&args.right)?;
    let m = match_frame(&board, StereoPair::new(&left, &right), &config.correspondence)?;
    Ok(serde_json::to_string_pretty(&MatchReport {
        left: xy(&m.image_points.left),
        right: xy(&m.image_points.right),
        object_points: m.object_points.iter().map(|p| [p.x, p.y, p.z]).collect(),
        ids: m.ids,
    })?)
}

fn xy(points: &[Point2<f64>]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x, p.y]).collect()
}
