//! Merging of overlapping detections.
//!
//! An SSD network reports the same palm from several neighbouring anchors. Each group of
//! overlapping detections is merged into one by averaging, weighted by confidence. This is
//! steadier from frame to frame than keeping only the best detection of a group.

use crate::{image::Rect, iter::zip_exact, num::TotalF32};

use super::{Detection, Keypoint};

/// Detections whose bounding boxes have at least this intersection over union are merged.
pub const IOU_THRESHOLD: f32 = 0.3;

/// Replaces each group of overlapping `detections` with its weighted average.
///
/// Groups are formed greedily around the most confident remaining detection, which also gives the
/// merged detection its confidence. The result is sorted by descending confidence.
///
/// # Panics
///
/// Panics if the detections do not all have the same number of keypoints.
pub fn suppress(detections: &mut Vec<Detection>) {
    let mut pending = std::mem::take(detections);
    pending.sort_unstable_by_key(|det| std::cmp::Reverse(TotalF32(det.confidence)));

    while !pending.is_empty() {
        let best = pending[0].bounding_rect();
        let (group, rest): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|det| best.iou(&det.bounding_rect()) >= IOU_THRESHOLD);
        detections.push(weighted_average(&group));
        pending = rest;
    }
}

/// `group` must be non-empty and sorted by descending confidence.
fn weighted_average(group: &[Detection]) -> Detection {
    let best = &group[0];
    let mut keypoints = vec![[0.0f32; 2]; best.keypoints.len()];
    let mut center = [0.0f32; 2];
    let mut size = [0.0f32; 2];
    // Angles are averaged as unit vectors so that ones near the -π/π seam do not cancel out.
    let mut angle = [0.0f32; 2];
    let mut total = 0.0;

    for det in group {
        let w = det.confidence;
        total += w;
        let rect = det.bounding_rect();
        center[0] += rect.x_center() * w;
        center[1] += rect.y_center() * w;
        size[0] += rect.width() * w;
        size[1] += rect.height() * w;
        angle[0] += det.angle.sin() * w;
        angle[1] += det.angle.cos() * w;
        for (sum, kp) in zip_exact(&mut keypoints, &det.keypoints) {
            sum[0] += kp.x * w;
            sum[1] += kp.y * w;
        }
    }

    let rect = Rect::from_center(
        center[0] / total,
        center[1] / total,
        size[0] / total,
        size[1] / total,
    );
    let keypoints = keypoints
        .into_iter()
        .map(|[x, y]| Keypoint::new(x / total, y / total))
        .collect();
    let mut merged = Detection::with_keypoints(best.confidence, rect, keypoints);
    merged.set_angle(angle[0].atan2(angle[1]));
    merged
}
