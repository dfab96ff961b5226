use crate::shared::geometry::{BBox, Point};

/// A detected face with a tracker-assigned id.
///
/// `landmarks` keeps the detector's positional schema: index `i` always
/// refers to the same anatomical point for a given model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Face {
    pub id: u32,
    pub bbox: BBox,
    pub landmarks: Vec<Point>,
}

/// One committed frame of a sequence. Owns its faces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub faces: Vec<Face>,
}

impl Frame {
    pub fn new(id: u32, width: u32, height: u32, faces: Vec<Face>) -> Self {
        Self {
            id,
            width,
            height,
            faces,
        }
    }

    pub fn face(&self, id: u32) -> Option<&Face> {
        self.faces.iter().find(|f| f.id == id)
    }

    pub fn face_ids(&self) -> Vec<u32> {
        self.faces.iter().map(|f| f.id).collect()
    }
}
