//! Optimal detection-to-track assignment.
//!
//! Maximizes total IoU (equivalently minimizes the `-IoU` cost matrix) with
//! the Kuhn-Munkres algorithm, then rejects pairs below the IoU threshold.

use pathfinding::prelude::{kuhn_munkres, Matrix};

/// IoU is scaled to integers for the solver.
const IOU_SCALE: f64 = 1_000_000.0;

/// Outcome of associating one frame's detections with the live tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    /// `(detection_idx, track_idx)` pairs.
    pub matches: Vec<(usize, usize)>,
    pub unmatched_detections: Vec<usize>,
    pub unmatched_tracks: Vec<usize>,
}

/// Solve the assignment for an IoU matrix (`rows = detections`).
pub fn associate(iou: &[Vec<f64>], num_tracks: usize, iou_threshold: f64) -> Association {
    let num_detections = iou.len();

    if num_detections == 0 || num_tracks == 0 {
        return Association {
            matches: Vec::new(),
            unmatched_detections: (0..num_detections).collect(),
            unmatched_tracks: (0..num_tracks).collect(),
        };
    }

    // Pad to square; dummy rows/columns carry zero weight.
    let size = num_detections.max(num_tracks);
    let mut weights = Matrix::new(size, size, 0i64);
    for (d, row) in iou.iter().enumerate() {
        for (t, &value) in row.iter().enumerate().take(num_tracks) {
            weights[(d, t)] = (value * IOU_SCALE).round() as i64;
        }
    }

    let (_total, assigned) = kuhn_munkres(&weights);

    let mut matches = Vec::new();
    let mut detection_matched = vec![false; num_detections];
    let mut track_matched = vec![false; num_tracks];
    for (d, &t) in assigned.iter().enumerate() {
        if d >= num_detections || t >= num_tracks {
            continue;
        }
        if iou[d][t] < iou_threshold || iou[d][t] <= 0.0 {
            continue;
        }
        matches.push((d, t));
        detection_matched[d] = true;
        track_matched[t] = true;
    }

    Association {
        matches,
        unmatched_detections: (0..num_detections)
            .filter(|&d| !detection_matched[d])
            .collect(),
        unmatched_tracks: (0..num_tracks).filter(|&t| !track_matched[t]).collect(),
    }
}
