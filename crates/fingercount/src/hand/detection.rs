//! Palm detection.

use std::path::Path;

use nalgebra::{Point2, Rotation2, Vector2};

use crate::detection::ssd::{Anchor, Anchors, LayerInfo};
use crate::detection::{self, Detection, Network};
use crate::image::{Rect, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::num::sigmoid;

use super::ModelVariant;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;

/// Values per box: center, size and 7 keypoints.
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

/// A palm detection network (lite or full variant).
///
/// Both variants take a 192x192 RGB image and share the same anchor layout.
pub struct PalmDetectionNetwork {
    cnn: Cnn,
    anchors: Anchors,
}

impl PalmDetectionNetwork {
    /// Loads the palm detection network of the given variant from `model_dir`.
    pub fn load(model_dir: &Path, variant: ModelVariant) -> anyhow::Result<Self> {
        let cnn = super::load_cnn(&model_dir.join(variant.palm_detection_file()), None)?;
        Ok(Self::from_cnn(cnn))
    }

    /// Wraps an already loaded palm detection [`Cnn`].
    pub fn from_cnn(cnn: Cnn) -> Self {
        Self {
            cnn,
            anchors: palm_anchors(),
        }
    }
}

fn palm_anchors() -> Anchors {
    Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)])
}

impl Network for PalmDetectionNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            &self.anchors,
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

/// Creates a [`detection::Detector`] that finds palms.
pub fn palm_detector(network: PalmDetectionNetwork) -> detection::Detector {
    detection::Detector::new(network)
}

fn extract_outputs(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    let num_anchors = anchors.anchor_count();
    let boxes = outputs.expect_shape(0, &[1, num_anchors, BOX_PARAMS])?;
    let confidences = outputs.expect_shape(1, &[1, num_anchors, 1])?;

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            box_params,
            conf,
        ));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    assert_eq!(box_params.len(), BOX_PARAMS);

    // Box and keypoint coordinates are offsets from the anchor, in input pixels.
    let anchor_x = anchor.x_center() * input_res.width() as f32;
    let anchor_y = anchor.y_center() * input_res.height() as f32;

    let xc = box_params[0] + anchor_x;
    let yc = box_params[1] + anchor_y;
    let w = box_params[2];
    let h = box_params[3];
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| detection::Keypoint::new(xy[0] + anchor_x, xy[1] + anchor_y))
        .collect::<Vec<_>>();

    let rect = Rect::from_center(xc, yc, w, h);
    let mut det = Detection::with_keypoints(confidence, rect, keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Computes the clockwise palm rotation from the wrist and middle finger keypoints.
///
/// 0° means the fingers point up.
fn palm_angle(det: &Detection) -> f32 {
    let kp = det.keypoints()[Keypoint::MiddleFingerMcp as usize];
    let finger = Point2::new(kp.x(), kp.y());
    let kp = det.keypoints()[Keypoint::Wrist as usize];
    let wrist = Point2::new(kp.x(), kp.y());

    let rel = wrist - finger;
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_abs_diff_eq;

    use crate::nn::tensor::Tensor;

    use super::*;

    fn box_params(wrist: [f32; 2], middle: [f32; 2]) -> Vec<f32> {
        let mut params = vec![0.0; BOX_PARAMS];
        params[2] = 40.0;
        params[3] = 30.0;
        params[4..6].copy_from_slice(&wrist);
        params[8..10].copy_from_slice(&middle);
        params
    }

    fn center_anchor() -> Anchor {
        Anchors::calculate(&[LayerInfo::new(1, 1, 1)])[0]
    }

    #[test]
    fn detection_relative_to_anchor() {
        let res = Resolution::new(192, 192);
        let mut params = box_params([0.0, 20.0], [0.0, -20.0]);
        params[0] = 10.0;
        params[1] = -6.0;
        let det = extract_detection(&center_anchor(), res, &params, 0.8);

        assert_eq!(det.confidence(), 0.8);
        assert_eq!(det.bounding_rect(), Rect::from_center(106.0, 90.0, 40.0, 30.0));
        assert_eq!(det.keypoints().len(), NUM_KEYPOINTS);
        assert_eq!(
            det.keypoints()[Keypoint::Wrist as usize],
            detection::Keypoint::new(96.0, 116.0)
        );
        assert_eq!(
            det.keypoints()[Keypoint::ThumbMcp as usize],
            detection::Keypoint::new(96.0, 96.0)
        );
    }

    #[test]
    fn upright_palm_has_no_rotation() {
        let res = Resolution::new(192, 192);
        let det = extract_detection(
            &center_anchor(),
            res,
            &box_params([0.0, 20.0], [0.0, -20.0]),
            1.0,
        );
        assert_abs_diff_eq!(det.angle(), 0.0);
    }

    #[test]
    fn sideways_palm_angle() {
        let res = Resolution::new(192, 192);

        // Fingers pointing right: rotated clockwise by 90°.
        let det = extract_detection(
            &center_anchor(),
            res,
            &box_params([-20.0, 0.0], [20.0, 0.0]),
            1.0,
        );
        assert_abs_diff_eq!(det.angle(), FRAC_PI_2, epsilon = 1e-5);

        // Fingers pointing left.
        let det = extract_detection(
            &center_anchor(),
            res,
            &box_params([20.0, 0.0], [-20.0, 0.0]),
            1.0,
        );
        assert_abs_diff_eq!(det.angle(), -FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn extract_applies_threshold() {
        let anchors = palm_anchors();
        let n = anchors.anchor_count();
        let boxes = Tensor::from_iter(
            &[1, n, BOX_PARAMS],
            std::iter::repeat(0.0).take(n * BOX_PARAMS),
        );
        // Logit 4.0 is ~0.98 after the sigmoid, -4.0 is ~0.02.
        let logits = (0..n).map(|i| if i == 5 { 4.0 } else { -4.0 });
        let scores = Tensor::from_iter(&[1, n, 1], logits);
        let outputs = [boxes, scores].into_iter().collect::<Outputs>();

        let mut detections = Vec::new();
        let res = Resolution::new(192, 192);
        extract_outputs(&anchors, res, &outputs, 0.5, &mut detections).unwrap();
        assert_eq!(detections.len(), 1);
        assert!(detections[0].confidence() > 0.95);
        let [x, y] = detections[0].bounding_rect().center();
        assert_abs_diff_eq!(x, anchors[5].x_center() * 192.0);
        assert_abs_diff_eq!(y, anchors[5].y_center() * 192.0);
    }

    #[test]
    fn extract_rejects_wrong_shape() {
        let anchors = palm_anchors();
        let outputs = [Tensor::from([0.0; 18]), Tensor::from([0.0])]
            .into_iter()
            .collect::<Outputs>();
        let mut detections = Vec::new();
        let res = Resolution::new(192, 192);
        let err = extract_outputs(&anchors, res, &outputs, 0.5, &mut detections).unwrap_err();
        assert!(err.to_string().contains("shape"), "{err}");
    }
}
