//! JSON encoding of a frame sequence.
//!
//! The file holds frame dimensions, ids, boxes and landmarks only; nothing
//! about the model or detector settings that produced them.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sequence::face::{Face, Frame};
use crate::shared::error::SequenceError;
use crate::shared::geometry::{BBox, Point};

pub const FORMAT_NAME: &str = "sequence_face_landmarks";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SequenceFile {
    format: String,
    version: u32,
    frames: Vec<FrameRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrameRecord {
    id: u32,
    width: u32,
    height: u32,
    faces: Vec<FaceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FaceRecord {
    id: u32,
    /// `[x, y, width, height]`
    bbox: [i32; 4],
    landmarks: Vec<[i32; 2]>,
}

impl From<&Frame> for FrameRecord {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id,
            width: frame.width,
            height: frame.height,
            faces: frame.faces.iter().map(FaceRecord::from).collect(),
        }
    }
}

impl From<&Face> for FaceRecord {
    fn from(face: &Face) -> Self {
        let b = face.bbox;
        Self {
            id: face.id,
            bbox: [b.x, b.y, b.width, b.height],
            landmarks: face.landmarks.iter().map(|p| [p.x, p.y]).collect(),
        }
    }
}

impl FaceRecord {
    fn into_face(self) -> Result<Face, String> {
        if self.id == u32::MAX {
            return Err(format!("face id {} is out of range", self.id));
        }
        let [x, y, width, height] = self.bbox;
        if width < 0 || height < 0 {
            return Err(format!("face {} has a negative bbox size", self.id));
        }
        if x.checked_add(width).is_none() || y.checked_add(height).is_none() {
            return Err(format!("face {} has a bbox past the coordinate range", self.id));
        }
        Ok(Face {
            id: self.id,
            bbox: BBox::new(x, y, width, height),
            landmarks: self
                .landmarks
                .into_iter()
                .map(|[x, y]| Point::new(x, y))
                .collect(),
        })
    }
}

impl FrameRecord {
    fn into_frame(self) -> Result<Frame, String> {
        let faces = self
            .faces
            .into_iter()
            .map(FaceRecord::into_face)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("frame {}: {e}", self.id))?;
        let mut seen = HashSet::with_capacity(faces.len());
        if let Some(dup) = faces.iter().find(|f| !seen.insert(f.id)) {
            return Err(format!("frame {}: face id {} appears twice", self.id, dup.id));
        }
        Ok(Frame::new(self.id, self.width, self.height, faces))
    }
}

/// Serializes `frames` into the sequence file format.
pub fn encode(frames: &[Frame]) -> Result<String, serde_json::Error> {
    let file = SequenceFile {
        format: FORMAT_NAME.to_string(),
        version: FORMAT_VERSION,
        frames: frames.iter().map(FrameRecord::from).collect(),
    };
    serde_json::to_string_pretty(&file)
}

/// Parses a sequence file's contents. `Err` carries a human-readable reason.
pub fn decode(text: &str) -> Result<Vec<Frame>, String> {
    let file: SequenceFile = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if file.format != FORMAT_NAME {
        return Err(format!(
            "unexpected format '{}', expected '{FORMAT_NAME}'",
            file.format
        ));
    }
    if file.version != FORMAT_VERSION {
        return Err(format!("unsupported version {}", file.version));
    }
    file.frames.into_iter().map(FrameRecord::into_frame).collect()
}

/// Reads and validates a whole sequence file.
pub fn load(path: &Path) -> Result<Vec<Frame>, SequenceError> {
    let text = fs::read_to_string(path).map_err(|source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&text).map_err(|reason| SequenceError::MalformedFile {
        path: path.to_path_buf(),
        reason,
    })
}

/// Writes `frames` to `path` through a sibling `.part` file, so an
/// interrupted save never truncates an existing file.
pub fn save(path: &Path, frames: &[Frame]) -> Result<(), SequenceError> {
    let temp_path = part_path(path);
    let result = write_and_rename(path, &temp_path, frames);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_and_rename(path: &Path, temp_path: &Path, frames: &[Frame]) -> Result<(), SequenceError> {
    let text = encode(frames).map_err(|e| SequenceError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let file = File::create(temp_path).map_err(io_err(temp_path))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .map_err(io_err(temp_path))?;
    writer.flush().map_err(io_err(temp_path))?;
    drop(writer);

    fs::rename(temp_path, path).map_err(io_err(path))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SequenceError {
    let path = path.to_path_buf();
    move |source| SequenceError::Io { path, source }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::new(
                0,
                640,
                480,
                vec![Face {
                    id: 0,
                    bbox: BBox::new(10, 10, 50, 50),
                    landmarks: vec![Point::new(20, 25), Point::new(40, 25)],
                }],
            ),
            Frame::new(1, 640, 480, Vec::new()),
            Frame::new(
                7,
                320,
                240,
                vec![
                    Face {
                        id: 3,
                        bbox: BBox::new(0, 0, 1, 1),
                        landmarks: vec![Point::new(-4, 300)],
                    },
                    Face {
                        id: 2,
                        bbox: BBox::new(100, 50, 30, 20),
                        landmarks: Vec::new(),
                    },
                ],
            ),
        ]
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seq.json");
        let frames = sample_frames();

        save(&path, &frames).unwrap();
        assert_eq!(load(&path).unwrap(), frames);
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_save_empty_sequence() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.json");
        save(&path, &[]).unwrap();
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_encoded_layout() {
        let text = encode(&sample_frames()[..1]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["format"], FORMAT_NAME);
        assert_eq!(value["version"], 1);
        let face = &value["frames"][0]["faces"][0];
        assert_eq!(face["bbox"], serde_json::json!([10, 10, 50, 50]));
        assert_eq!(face["landmarks"], serde_json::json!([[20, 25], [40, 25]]));
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("seq.json");
        save(&path, &sample_frames()).unwrap();
        save(&path, &sample_frames()[1..2]).unwrap();
        assert_eq!(load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_save_into_missing_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("no_such_dir").join("seq.json");
        let err = save(&path, &sample_frames()).unwrap_err();
        assert!(matches!(err, SequenceError::Io { .. }));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SequenceError::Io { .. }));
        assert!(err.is_io_failure());
    }

    #[test]
    fn test_load_garbage_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, SequenceError::MalformedFile { .. }));
    }

    #[rstest::rstest]
    #[case::wrong_format(r#"{"format":"other","version":1,"frames":[]}"#)]
    #[case::future_version(r#"{"format":"sequence_face_landmarks","version":2,"frames":[]}"#)]
    #[case::missing_frames(r#"{"format":"sequence_face_landmarks","version":1}"#)]
    #[case::negative_face_id(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":-1,"bbox":[0,0,1,1],"landmarks":[]}]}]}"#
    )]
    #[case::negative_frame_width(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":-4,"height":4,"faces":[]}]}"#
    )]
    #[case::negative_bbox_size(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":0,"bbox":[0,0,-1,1],"landmarks":[]}]}]}"#
    )]
    #[case::short_bbox(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":0,"bbox":[0,0,1],"landmarks":[]}]}]}"#
    )]
    #[case::odd_landmark(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":0,"bbox":[0,0,1,1],"landmarks":[[1]]}]}]}"#
    )]
    #[case::max_face_id(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":4294967295,"bbox":[0,0,1,1],"landmarks":[]}]}]}"#
    )]
    #[case::bbox_right_edge_overflows(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":0,"bbox":[2147483000,0,1000,1],"landmarks":[]}]}]}"#
    )]
    #[case::bbox_bottom_edge_overflows(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":4,"height":4,"faces":[{"id":0,"bbox":[0,2147483000,1,1000],"landmarks":[]}]}]}"#
    )]
    #[case::duplicate_face_id_in_frame(
        r#"{"format":"sequence_face_landmarks","version":1,"frames":[{"id":0,"width":99,"height":99,"faces":[{"id":3,"bbox":[0,0,10,10],"landmarks":[]},{"id":3,"bbox":[50,50,10,10],"landmarks":[]}]}]}"#
    )]
    fn test_decode_rejects(#[case] text: &str) {
        assert!(decode(text).is_err());
    }

    #[test]
    fn test_same_face_id_across_frames_is_accepted() {
        let text = r#"{"format":"sequence_face_landmarks","version":1,"frames":[
            {"id":0,"width":99,"height":99,"faces":[{"id":3,"bbox":[0,0,10,10],"landmarks":[]}]},
            {"id":1,"width":99,"height":99,"faces":[{"id":3,"bbox":[1,0,10,10],"landmarks":[]}]}]}"#;
        let frames = decode(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].face_ids(), vec![3]);
    }

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/out.json")),
            PathBuf::from("/tmp/out.json.part")
        );
    }
}
