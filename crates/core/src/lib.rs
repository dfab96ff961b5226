//! Face detection, landmark extraction and identity tracking over ordered
//! frame sequences.
//!
//! The entry point is [`sequence::sequence_face_landmarks`]: build a sequence
//! with [`create`](sequence::sequence_face_landmarks::create) or
//! [`create_default`](sequence::sequence_face_landmarks::create_default), feed
//! it images with `add_frame`, then read or save the tracked frames.

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod geometry;
    pub mod image;
    pub mod video_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod sequence {
    pub mod face;
    pub mod face_tracker;
    pub mod frame_sequence;
    pub mod landmark_sequence;
    pub mod sequence_face_landmarks;
}

pub mod persistence {
    pub mod sequence_codec;
}

pub mod rendering {
    pub mod overlay;
}

pub mod video {
    pub mod domain {
        pub mod image_writer;
        pub mod video_reader;
    }
    pub mod infrastructure {
        pub mod ffmpeg_reader;
        pub mod image_file_reader;
        pub mod image_file_writer;
    }
}

pub mod pipeline {
    pub mod process_sequence_use_case;
}

pub use sequence::face::{Face, Frame};
pub use sequence::sequence_face_landmarks::{create, create_default, SequenceFaceLandmarks};
pub use shared::error::SequenceError;
pub use shared::image::Image;
