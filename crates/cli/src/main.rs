use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use faceseq_core::detection::infrastructure::model_resolver;
use faceseq_core::detection::infrastructure::onnx_yolo_detector::{
    OnnxDetectorLoader, DEFAULT_CONFIDENCE,
};
use faceseq_core::pipeline::process_sequence_use_case::{
    FrameObserver, ProcessSequenceUseCase, ProgressFn,
};
use faceseq_core::rendering::overlay::{
    render_frame, DEFAULT_BBOX_COLOR, DEFAULT_LANDMARKS_COLOR, DEFAULT_THICKNESS,
};
use faceseq_core::sequence::landmark_sequence::LandmarkSequence;
use faceseq_core::sequence::sequence_face_landmarks::{SequenceFaceLandmarks, SequenceOptions};
use faceseq_core::shared::constants::{
    DEFAULT_FIRST_FACE_ID, DEFAULT_IOU_THRESHOLD, IMAGE_EXTENSIONS, YOLO_MODEL_NAME,
};
use faceseq_core::video::domain::image_writer::ImageWriter;
use faceseq_core::video::domain::video_reader::VideoReader;
use faceseq_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use faceseq_core::video::infrastructure::image_file_reader::ImageFileReader;
use faceseq_core::video::infrastructure::image_file_writer::ImageFileWriter;
use faceseq_core::Image;

/// Face landmark extraction with identity tracking for videos and images.
#[derive(Parser, Debug)]
#[command(name = "faceseq")]
struct Cli {
    /// Input video or image file.
    input: PathBuf,

    /// Output sequence file (JSON).
    output: PathBuf,

    /// ONNX landmark model (default: built-in model, downloaded on first use).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Scale applied to frames before detection (> 0).
    #[arg(long, default_value = "1.0")]
    frame_scale: f32,

    /// Keep face ids consistent across frames.
    #[arg(long)]
    track_faces: bool,

    /// Minimum box overlap for a face to keep its id (0.0-1.0].
    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou_threshold: f64,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,

    /// Write one PNG per frame with faces and landmarks drawn on it.
    #[arg(long)]
    render_dir: Option<PathBuf>,

    /// Number each landmark in rendered frames.
    #[arg(long)]
    draw_labels: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let model_path = match &cli.model {
        Some(path) => path.clone(),
        None => {
            log::info!("Resolving model: {YOLO_MODEL_NAME}");
            let path = model_resolver::default_model(Some(Box::new(download_progress)))?;
            eprintln!();
            path
        }
    };

    let mut sequence = LandmarkSequence::with_loader(
        Arc::new(OnnxDetectorLoader::new(cli.confidence)),
        SequenceOptions {
            model_path,
            frame_scale: cli.frame_scale,
            track_faces: cli.track_faces,
            iou_threshold: cli.iou_threshold,
            first_face_id: DEFAULT_FIRST_FACE_ID,
        },
    )?;

    let mut reader = open_reader(&cli.input);
    let metadata = reader.open(&cli.input)?;

    let total = metadata.total_frames;
    let progress: ProgressFn = Box::new(move |current, _| {
        eprint!("\rProcessing frame {current}/{total}");
        true
    });
    let observer = cli
        .render_dir
        .as_ref()
        .map(|dir| render_observer(dir.clone(), cli.draw_labels));

    let mut use_case = ProcessSequenceUseCase::new(reader, Some(progress), observer);
    let processed = use_case.execute(&mut sequence, &metadata)?;
    eprintln!();

    sequence.save(&cli.output)?;
    log::info!(
        "Wrote {processed} frame(s) to {}",
        cli.output.display()
    );
    Ok(())
}

fn render_observer(dir: PathBuf, draw_labels: bool) -> FrameObserver {
    let writer = ImageFileWriter::new();
    Box::new(move |image, frame| {
        let mut canvas = image.to_rgb_image();
        render_frame(
            &mut canvas,
            frame,
            draw_labels,
            DEFAULT_BBOX_COLOR,
            DEFAULT_LANDMARKS_COLOR,
            DEFAULT_THICKNESS,
        );
        let path = dir.join(format!("frame_{:06}.png", frame.id));
        writer.write(&path, &Image::from_rgb(canvas))
    })
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(model) = &cli.model {
        if !model.is_file() {
            return Err(format!("Model file not found: {}", model.display()).into());
        }
    }
    if !cli.frame_scale.is_finite() || cli.frame_scale <= 0.0 {
        return Err(format!("Frame scale must be positive, got {}", cli.frame_scale).into());
    }
    if !(cli.iou_threshold > 0.0 && cli.iou_threshold <= 1.0) {
        return Err(format!(
            "IoU threshold must be in (0.0, 1.0], got {}",
            cli.iou_threshold
        )
        .into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.draw_labels && cli.render_dir.is_none() {
        return Err("--draw-labels requires --render-dir".into());
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_reader(input: &Path) -> Box<dyn VideoReader> {
    if is_image(input) {
        Box::new(ImageFileReader::new())
    } else {
        Box::new(FfmpegReader::new())
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading landmark model... {pct}%");
    } else {
        eprint!("\rDownloading landmark model... {downloaded} bytes");
    }
}
