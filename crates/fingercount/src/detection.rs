//! Single-class object detection.
//!
//! [`Detector`] handles what every SSD-style detector needs: fitting the frame to the network
//! input, merging duplicate detections, and mapping results back to frame coordinates. Decoding
//! the raw network outputs is left to a [`Network`] implementation, such as the palm detector in
//! [`crate::hand::detection`].

pub mod nms;
pub mod ssd;

use crate::image::{AsImageView, ImageView, Rect, Resolution};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

/// A detection network and the code to decode its outputs.
pub trait Network: Send + Sync + 'static {
    fn cnn(&self) -> &Cnn;

    /// Appends every detection with a confidence of at least `threshold` to `detections`.
    ///
    /// Positions are in network input pixels. Fails if `outputs` are not shaped like this
    /// network's outputs.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// Runs a detection [`Network`] on whole frames.
pub struct Detector {
    network: Box<dyn Network>,
    threshold: f32,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            threshold: Self::DEFAULT_THRESHOLD,
            detections: Vec::new(),
            t_infer: Timer::new("detect infer"),
            t_extract: Timer::new("detect extract"),
            t_nms: Timer::new("nms"),
        }
    }

    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    /// Detections less confident than `threshold` are dropped before merging.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }

    /// Detects objects in `image`.
    ///
    /// The image is letterboxed to the network's aspect ratio. Detections are returned in
    /// `image` coordinates, most confident first.
    pub fn detect<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&[Detection]> {
        self.detect_in(image.as_view())
    }

    fn detect_in(&mut self, image: ImageView<'_>) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let input_res = self.input_resolution();
        let Some(aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("detection network input is empty ({input_res})");
        };
        let letterbox = image.rect().grow_to_fit_aspect(aspect);

        let cnn = self.network.cnn();
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(letterbox)))?;
        log::trace!("detection network outputs: {:?}", outputs);

        {
            let _guard = self.t_extract.start();
            self.network
                .extract(&outputs, self.threshold, &mut self.detections)?;
        }
        {
            let _guard = self.t_nms.start();
            nms::suppress(&mut self.detections);
        }

        let scale = letterbox.width() / input_res.width() as f32;
        let offset = [letterbox.x(), letterbox.y()];
        for det in &mut self.detections {
            det.map_out(scale, offset);
        }

        Ok(&self.detections)
    }
}

/// An object found by a [`Detector`].
///
/// Holds an axis-aligned box around the object, a confidence in `0.0..=1.0`, the object's
/// clockwise rotation in radians, and network-specific keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Clockwise rotation in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, radians: f32) {
        self.angle = radians;
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Maps network input coordinates to the frame, given the frame-pixels-per-input-pixel
    /// `scale` and the frame position of the input's top left corner.
    fn map_out(&mut self, scale: f32, [dx, dy]: [f32; 2]) {
        let map = |x: f32, y: f32| (x * scale + dx, y * scale + dy);

        let (x, y) = map(self.rect.x_center(), self.rect.y_center());
        self.rect = Rect::from_center(x, y, self.rect.width() * scale, self.rect.height() * scale);
        for kp in &mut self.keypoints {
            (kp.x, kp.y) = map(kp.x, kp.y);
        }
    }
}

/// A point of interest on a [`Detection`]. Which point each index stands for depends on the
/// network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn map_out_scales_size_and_offsets_position() {
        let mut det = Detection::with_keypoints(
            0.9,
            Rect::from_center(96.0, 48.0, 20.0, 10.0),
            vec![Keypoint::new(0.0, 192.0)],
        );
        // A 640x480 frame letterboxed to 640x640 and shrunk to 192x192.
        det.map_out(640.0 / 192.0, [0.0, -80.0]);

        let rect = det.bounding_rect();
        assert_abs_diff_eq!(rect.x_center(), 320.0, epsilon = 1e-3);
        assert_abs_diff_eq!(rect.y_center(), 80.0, epsilon = 1e-3);
        assert_abs_diff_eq!(rect.width(), 66.666_67, epsilon = 1e-3);
        assert_abs_diff_eq!(rect.height(), 33.333_33, epsilon = 1e-3);
        assert_abs_diff_eq!(det.keypoints()[0].x(), 0.0);
        assert_abs_diff_eq!(det.keypoints()[0].y(), 560.0, epsilon = 1e-3);
    }

    #[test]
    fn angle_defaults_to_upright() {
        let mut det = Detection::new(0.5, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        assert_eq!(det.angle(), 0.0);
        det.set_angle(1.5);
        assert_eq!(det.angle(), 1.5);
        assert!(det.keypoints().is_empty());
    }
}
