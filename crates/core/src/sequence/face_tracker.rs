//! Greedy IoU face tracker.
//!
//! Each frame's detections are matched against the faces of the frame
//! immediately before it. A match inherits the previous face's id; every
//! other detection gets a fresh id from a counter that never goes back.
//! Faces that are not matched are forgotten at once, so a face that
//! disappears for a single frame comes back with a new id.
use std::cmp::Ordering;

use crate::detection::domain::face_detector::RawFace;
use crate::shared::constants::{DEFAULT_FIRST_FACE_ID, DEFAULT_IOU_THRESHOLD};
use crate::shared::error::SequenceError;
use crate::shared::geometry::landmark_centroid;

use super::face::Face;

/// Mutable tracker state carried from one frame to the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerState {
    pub last_faces: Vec<Face>,
    pub next_id: u32,
}

#[derive(Clone, Debug)]
pub struct FaceTracker {
    iou_threshold: f64,
    first_id: u32,
    state: TrackerState,
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD, DEFAULT_FIRST_FACE_ID)
    }
}

impl FaceTracker {
    pub fn new(iou_threshold: f64, first_id: u32) -> Self {
        Self {
            iou_threshold,
            first_id,
            state: TrackerState {
                last_faces: Vec::new(),
                next_id: first_id,
            },
        }
    }

    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    pub fn set_iou_threshold(&mut self, iou_threshold: f64) {
        self.iou_threshold = iou_threshold;
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Forget every face and restart the id counter.
    pub fn reset(&mut self) {
        self.state = TrackerState {
            last_faces: Vec::new(),
            next_id: self.first_id,
        };
    }

    /// Replace the state wholesale, e.g. after loading a saved sequence.
    pub fn restore(&mut self, state: TrackerState) {
        self.state = state;
    }

    /// Assign ids to one frame's detections.
    ///
    /// With `enabled == false` every detection gets a fresh id. Output keeps
    /// detection order either way, and the state always advances to this
    /// frame's faces. `u32::MAX` is never issued; running out of ids fails
    /// with [`SequenceError::IdsExhausted`] and leaves the state untouched.
    pub fn track(
        &mut self,
        detections: Vec<RawFace>,
        enabled: bool,
    ) -> Result<Vec<Face>, SequenceError> {
        let inherited = if enabled {
            associate(&self.state.last_faces, &detections, self.iou_threshold)
        } else {
            vec![None; detections.len()]
        };

        let mut next_id = self.state.next_id;
        let mut faces = Vec::with_capacity(detections.len());
        for (det, inherited_id) in detections.into_iter().zip(inherited) {
            let id = match inherited_id {
                Some(id) => id,
                None => allocate_id(&mut next_id)?,
            };
            faces.push(Face {
                id,
                bbox: det.bbox,
                landmarks: det.landmarks,
            });
        }

        self.state = TrackerState {
            last_faces: faces.clone(),
            next_id,
        };
        Ok(faces)
    }
}

fn allocate_id(next_id: &mut u32) -> Result<u32, SequenceError> {
    let id = *next_id;
    *next_id = id.checked_add(1).ok_or(SequenceError::IdsExhausted)?;
    Ok(id)
}

#[derive(Debug)]
struct Candidate {
    prev_idx: usize,
    det_idx: usize,
    prev_id: u32,
    iou: f64,
    landmark_dist: Option<f64>,
}

/// Greedy best-match between previous faces and new detections.
///
/// Returns, per detection, the id it inherits or `None` when it is new.
/// Pairs qualify with `iou > 0 && iou >= iou_threshold` and are taken in
/// order of IoU (descending), landmark-centroid distance (ascending; pairs
/// without landmarks last), previous face id, then detection index.
pub fn associate(
    previous: &[Face],
    detections: &[RawFace],
    iou_threshold: f64,
) -> Vec<Option<u32>> {
    let mut candidates = Vec::new();
    for (pi, prev) in previous.iter().enumerate() {
        let prev_center = landmark_centroid(&prev.landmarks);
        for (di, det) in detections.iter().enumerate() {
            let iou = prev.bbox.iou(&det.bbox);
            if iou <= 0.0 || iou < iou_threshold {
                continue;
            }
            let landmark_dist = match (prev_center, landmark_centroid(&det.landmarks)) {
                (Some((px, py)), Some((dx, dy))) => Some((px - dx).hypot(py - dy)),
                _ => None,
            };
            candidates.push(Candidate {
                prev_idx: pi,
                det_idx: di,
                prev_id: prev.id,
                iou,
                landmark_dist,
            });
        }
    }
    candidates.sort_by(compare_candidates);

    let mut used_prev = vec![false; previous.len()];
    let mut assigned: Vec<Option<u32>> = vec![None; detections.len()];
    for c in &candidates {
        if used_prev[c.prev_idx] || assigned[c.det_idx].is_some() {
            continue;
        }
        used_prev[c.prev_idx] = true;
        assigned[c.det_idx] = Some(c.prev_id);
    }
    assigned
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.iou
        .partial_cmp(&a.iou)
        .unwrap_or(Ordering::Equal)
        .then_with(|| match (a.landmark_dist, b.landmark_dist) {
            (Some(da), Some(db)) => da.partial_cmp(&db).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.prev_id.cmp(&b.prev_id))
        .then_with(|| a.det_idx.cmp(&b.det_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::geometry::{BBox, Point};
    use rstest::rstest;

    fn det(x: i32, y: i32, w: i32, h: i32) -> RawFace {
        RawFace {
            bbox: BBox::new(x, y, w, h),
            landmarks: Vec::new(),
        }
    }

    fn det_with_landmarks(x: i32, y: i32, w: i32, h: i32, pts: &[(i32, i32)]) -> RawFace {
        RawFace {
            bbox: BBox::new(x, y, w, h),
            landmarks: pts.iter().map(|&(px, py)| Point::new(px, py)).collect(),
        }
    }

    fn ids(faces: &[Face]) -> Vec<u32> {
        faces.iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_first_frame_allocates_sequential_ids() {
        let mut tracker = FaceTracker::default();
        let faces = tracker.track(vec![det(0, 0, 50, 50), det(100, 100, 50, 50)], true).unwrap();
        assert_eq!(ids(&faces), vec![0, 1]);
        assert_eq!(tracker.state().next_id, 2);
    }

    #[test]
    fn test_consistent_id_across_frames() {
        let mut tracker = FaceTracker::default();
        let f0 = tracker.track(vec![det(10, 10, 50, 50)], true).unwrap();
        let f1 = tracker.track(vec![det(12, 11, 51, 50)], true).unwrap();
        let f2 = tracker.track(vec![det(14, 12, 50, 51)], true).unwrap();
        assert_eq!(f0[0].id, 0);
        assert_eq!(f1[0].id, 0);
        assert_eq!(f2[0].id, 0);
    }

    #[test]
    fn test_three_frame_scenario_tracking_on() {
        let mut tracker = FaceTracker::default();
        let f0 = tracker.track(vec![det(10, 10, 50, 50)], true).unwrap();
        let f1 = tracker.track(vec![det(12, 11, 51, 50)], true).unwrap();
        let f2 = tracker.track(vec![det(60, 60, 30, 30)], true).unwrap();
        assert_eq!((f0[0].id, f1[0].id, f2[0].id), (0, 0, 1));
    }

    #[test]
    fn test_three_frame_scenario_tracking_off() {
        let mut tracker = FaceTracker::default();
        let f0 = tracker.track(vec![det(10, 10, 50, 50)], false).unwrap();
        let f1 = tracker.track(vec![det(12, 11, 51, 50)], false).unwrap();
        let f2 = tracker.track(vec![det(60, 60, 30, 30)], false).unwrap();
        assert_eq!((f0[0].id, f1[0].id, f2[0].id), (0, 1, 2));
    }

    #[test]
    fn test_disabled_counter_never_reuses_across_empty_frames() {
        let mut tracker = FaceTracker::default();
        let mut all = Vec::new();
        all.extend(ids(&tracker.track(vec![det(0, 0, 10, 10), det(20, 0, 10, 10)], false).unwrap()));
        all.extend(ids(&tracker.track(vec![], false).unwrap()));
        all.extend(ids(&tracker.track(vec![det(0, 0, 10, 10)], false).unwrap()));
        all.extend(ids(&tracker.track(vec![], false).unwrap()));
        all.extend(ids(&tracker.track(vec![det(0, 0, 10, 10)], false).unwrap()));
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_non_overlapping_detection_gets_greater_fresh_id() {
        let mut tracker = FaceTracker::default();
        tracker.track(vec![det(0, 0, 20, 20), det(50, 0, 20, 20)], true).unwrap();
        let faces = tracker.track(vec![det(0, 0, 20, 20), det(200, 200, 20, 20)], true).unwrap();
        assert_eq!(faces[0].id, 0);
        assert_eq!(faces[1].id, 2);
    }

    #[test]
    fn test_empty_frame_discards_previous_faces() {
        let mut tracker = FaceTracker::default();
        tracker.track(vec![det(10, 10, 50, 50)], true).unwrap();
        assert!(tracker.track(vec![], true).unwrap().is_empty());
        // Same position reappears: no grace period, so a new id
        let faces = tracker.track(vec![det(10, 10, 50, 50)], true).unwrap();
        assert_eq!(faces[0].id, 1);
    }

    #[test]
    fn test_below_threshold_is_new_face() {
        let mut tracker = FaceTracker::default();
        tracker.track(vec![det(0, 0, 100, 100)], true).unwrap();
        // IoU = 5000 / 15000 ≈ 0.333 passes, 2000 / 18000 ≈ 0.111 does not
        let passes = tracker.track(vec![det(50, 0, 100, 100)], true).unwrap();
        assert_eq!(passes[0].id, 0);
        let fails = tracker.track(vec![det(130, 0, 100, 100)], true).unwrap();
        assert_eq!(fails[0].id, 1);
    }

    #[test]
    fn test_multiple_faces_keep_their_ids() {
        let mut tracker = FaceTracker::default();
        let t1 = tracker.track(vec![det(0, 0, 50, 50), det(200, 200, 50, 50)], true).unwrap();
        let t2 = tracker.track(vec![det(202, 202, 50, 50), det(2, 2, 50, 50)], true).unwrap();
        assert_eq!(ids(&t1), vec![0, 1]);
        // Output follows detection order, ids follow the faces
        assert_eq!(ids(&t2), vec![1, 0]);
    }

    #[test]
    fn test_greedy_prefers_highest_iou() {
        let previous = vec![Face {
            id: 4,
            bbox: BBox::new(0, 0, 100, 100),
            landmarks: Vec::new(),
        }];
        let detections = vec![det(40, 0, 100, 100), det(5, 0, 100, 100)];
        assert_eq!(associate(&previous, &detections, 0.3), vec![None, Some(4)]);
    }

    #[test]
    fn test_each_previous_face_matches_once() {
        let previous = vec![Face {
            id: 0,
            bbox: BBox::new(0, 0, 100, 100),
            landmarks: Vec::new(),
        }];
        let detections = vec![det(0, 0, 100, 100), det(0, 0, 100, 100)];
        assert_eq!(associate(&previous, &detections, 0.3), vec![Some(0), None]);
    }

    fn tied_previous() -> Vec<Face> {
        // Both overlap the detection at (5,0,20,10) with IoU 50/250 = 0.2
        vec![
            Face {
                id: 5,
                bbox: BBox::new(0, 0, 10, 10),
                landmarks: vec![Point::new(5, 5)],
            },
            Face {
                id: 2,
                bbox: BBox::new(20, 0, 10, 10),
                landmarks: vec![Point::new(25, 5)],
            },
        ]
    }

    #[test]
    fn test_iou_tie_broken_by_lowest_previous_id() {
        let detections = vec![det(5, 0, 20, 10)];
        assert_eq!(associate(&tied_previous(), &detections, 0.1), vec![Some(2)]);
    }

    #[test]
    fn test_iou_tie_broken_by_landmark_distance_first() {
        // Landmark centroid at (8,5) is closer to face 5's (5,5)
        let detections = vec![det_with_landmarks(5, 0, 20, 10, &[(8, 5)])];
        assert_eq!(associate(&tied_previous(), &detections, 0.1), vec![Some(5)]);
    }

    #[rstest]
    #[case::threshold_zero(0.0)]
    #[case::threshold_default(0.3)]
    fn test_zero_iou_never_matches(#[case] threshold: f64) {
        let previous = vec![Face {
            id: 0,
            bbox: BBox::new(0, 0, 10, 10),
            landmarks: Vec::new(),
        }];
        let detections = vec![det(10, 0, 10, 10)];
        assert_eq!(associate(&previous, &detections, threshold), vec![None]);
    }

    #[test]
    fn test_reset_restarts_counter_and_forgets_faces() {
        let mut tracker = FaceTracker::default();
        tracker.track(vec![det(10, 10, 50, 50)], true).unwrap();
        tracker.track(vec![det(10, 10, 50, 50), det(100, 10, 50, 50)], true).unwrap();
        tracker.reset();
        assert!(tracker.state().last_faces.is_empty());
        let faces = tracker.track(vec![det(100, 10, 50, 50)], true).unwrap();
        assert_eq!(faces[0].id, 0);
    }

    #[test]
    fn test_custom_first_id() {
        let mut tracker = FaceTracker::new(DEFAULT_IOU_THRESHOLD, 100);
        let faces = tracker.track(vec![det(0, 0, 10, 10), det(50, 50, 10, 10)], false).unwrap();
        assert_eq!(ids(&faces), vec![100, 101]);
    }

    #[test]
    fn test_restore_continues_from_given_state() {
        let mut tracker = FaceTracker::default();
        tracker.restore(TrackerState {
            last_faces: vec![Face {
                id: 9,
                bbox: BBox::new(10, 10, 50, 50),
                landmarks: Vec::new(),
            }],
            next_id: 10,
        });
        let faces = tracker.track(vec![det(11, 10, 50, 50), det(300, 300, 20, 20)], true).unwrap();
        assert_eq!(ids(&faces), vec![9, 10]);
    }

    #[test]
    fn test_landmarks_preserved_verbatim() {
        let mut tracker = FaceTracker::default();
        let pts = [(30, 20), (10, 20), (20, 30), (15, 40), (25, 40)];
        let faces = tracker.track(vec![det_with_landmarks(0, 0, 50, 50, &pts)], true).unwrap();
        let got: Vec<(i32, i32)> = faces[0].landmarks.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(got, pts.to_vec());
    }

    #[test]
    fn test_last_ids_before_max_are_issued_then_exhausted() {
        let mut tracker = FaceTracker::default();
        tracker.restore(TrackerState {
            last_faces: Vec::new(),
            next_id: u32::MAX - 1,
        });
        let faces = tracker.track(vec![det(0, 0, 10, 10)], true).unwrap();
        assert_eq!(ids(&faces), vec![u32::MAX - 1]);

        let before = tracker.state().clone();
        let err = tracker.track(vec![det(200, 200, 10, 10)], true).unwrap_err();
        assert!(matches!(err, SequenceError::IdsExhausted));
        assert_eq!(*tracker.state(), before);
    }

    #[test]
    fn test_matches_still_work_with_exhausted_counter() {
        let mut tracker = FaceTracker::default();
        tracker.restore(TrackerState {
            last_faces: vec![Face {
                id: 7,
                bbox: BBox::new(10, 10, 50, 50),
                landmarks: Vec::new(),
            }],
            next_id: u32::MAX,
        });
        let faces = tracker.track(vec![det(11, 10, 50, 50)], true).unwrap();
        assert_eq!(ids(&faces), vec![7]);
    }
}
