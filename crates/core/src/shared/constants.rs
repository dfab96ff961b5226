pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

/// Minimum IoU for a detection to inherit a previous face's id.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.3;

pub const DEFAULT_FRAME_SCALE: f32 = 1.0;

/// First id handed out by a fresh tracker.
pub const DEFAULT_FIRST_FACE_ID: u32 = 0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
