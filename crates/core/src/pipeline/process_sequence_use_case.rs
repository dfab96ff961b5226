use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::sequence::face::Frame;
use crate::sequence::sequence_face_landmarks::SequenceFaceLandmarks;
use crate::shared::image::Image;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// `(frames_done, total_frames)`; returning `false` stops the run.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Called with each decoded image and the frame committed for it.
pub type FrameObserver = Box<dyn FnMut(&Image, &Frame) -> Result<(), Box<dyn std::error::Error>>>;

/// Feeds every frame of an opened reader into a sequence.
///
/// Decoding runs on its own thread and hands images over through a bounded
/// channel; detection and tracking stay on the calling thread so frames are
/// committed strictly in decode order. The first error from the decoder,
/// the sequence or the observer ends the run. Single-use: `execute` takes
/// the reader.
pub struct ProcessSequenceUseCase {
    reader: Option<Box<dyn VideoReader>>,
    channel_capacity: usize,
    on_progress: Option<ProgressFn>,
    on_frame: Option<FrameObserver>,
    cancelled: Arc<AtomicBool>,
}

impl ProcessSequenceUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        on_progress: Option<ProgressFn>,
        on_frame: Option<FrameObserver>,
    ) -> Self {
        Self {
            reader: Some(reader),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            on_progress,
            on_frame,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the whole source through `sequence`. Returns how many frames
    /// were committed.
    pub fn execute(
        &mut self,
        sequence: &mut dyn SequenceFaceLandmarks,
        metadata: &VideoMetadata,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let reader = self.reader.take().ok_or("Pipeline already executed")?;
        let total = metadata.total_frames;
        if metadata.is_still() {
            log::debug!("Source is a still image");
        } else {
            log::debug!(
                "Source: {}x{} @ {:.2} fps, ~{total} frame(s)",
                metadata.width,
                metadata.height,
                metadata.fps
            );
        }

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Result<Image, SendError>>(self.channel_capacity);
        let reader_handle = spawn_reader(reader, frame_tx, self.cancelled.clone());

        let result = self.consume(frame_rx, sequence, total);

        // The receiver is gone by now, so a blocked send fails too
        self.cancelled.store(true, Ordering::Relaxed);
        reader_handle
            .join()
            .map_err(|_| "Reader thread panicked")?;

        let processed = result?;
        log::info!("Processed {processed} frame(s)");
        Ok(processed)
    }

    fn consume(
        &mut self,
        frame_rx: crossbeam_channel::Receiver<Result<Image, SendError>>,
        sequence: &mut dyn SequenceFaceLandmarks,
        total: usize,
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let mut processed = 0;
        for item in frame_rx {
            let image = item.map_err(|e| -> Box<dyn std::error::Error> { e })?;
            let frame = sequence.add_frame(&image, None)?;
            if let Some(observer) = self.on_frame.as_mut() {
                observer(&image, frame)?;
            }
            processed += 1;

            if let Some(cb) = &self.on_progress {
                if !cb(processed, total) {
                    log::info!("Stopped after {processed} frame(s)");
                    break;
                }
            }
        }
        Ok(processed)
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: crossbeam_channel::Sender<Result<Image, SendError>>,
    cancelled: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let failed = frame_result.is_err();
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() || failed {
                break;
            }
        }
        reader.close();
    })
}
