use std::ops::Index;

use super::face::Frame;

/// Ordered, append-only store of committed frames.
///
/// Position is temporal order; frame ids are payload and may repeat or go
/// backwards when supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and returns a reference to the stored copy.
    pub fn push(&mut self, frame: Frame) -> &Frame {
        self.frames.push(frame);
        &self.frames[self.frames.len() - 1]
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn last(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn as_slice(&self) -> &[Frame] {
        &self.frames
    }

    /// Largest face id held anywhere in the sequence.
    pub fn max_face_id(&self) -> Option<u32> {
        self.frames
            .iter()
            .flat_map(|frame| frame.faces.iter().map(|f| f.id))
            .max()
    }

    pub fn max_frame_id(&self) -> Option<u32> {
        self.frames.iter().map(|f| f.id).max()
    }
}

impl From<Vec<Frame>> for FrameSequence {
    fn from(frames: Vec<Frame>) -> Self {
        Self { frames }
    }
}

impl Index<usize> for FrameSequence {
    type Output = Frame;

    fn index(&self, index: usize) -> &Frame {
        &self.frames[index]
    }
}

impl<'a> IntoIterator for &'a FrameSequence {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
