//! Single-hand tracking.
//!
//! The [`HandTracker`] runs the palm detector only while no hand is being tracked. Once a palm is
//! found, the landmark network follows the hand from frame to frame until its presence score drops
//! below the tracking threshold.

use std::path::Path;

use crate::detection::{Detection, Detector};
use crate::filter::ema::Ema;
use crate::image::{Image, Rect, RotatedRect};
use crate::landmark::{Estimator, LandmarkFilter, LandmarkTracker};
use crate::timer::Timer;

use super::detection::{palm_detector, PalmDetectionNetwork};
use super::landmark::{HandLandmarkNetwork, LandmarkResult, NUM_LANDMARKS};
use super::ModelVariant;

/// Factor by which the rotated palm rectangle is enlarged to cover the whole hand.
const PALM_TO_HAND_SCALE: f32 = 2.6;

/// A hand found in a frame.
#[derive(Debug, Clone)]
pub struct HandData {
    landmarks: LandmarkResult,
    view_rect: RotatedRect,
}

impl HandData {
    /// Returns the estimated landmarks, in frame coordinates.
    pub fn landmarks(&self) -> &LandmarkResult {
        &self.landmarks
    }

    /// Returns the region of the frame the landmarks were estimated from.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }
}

/// Detects and tracks a single hand across frames.
pub struct HandTracker {
    detector: Detector,
    tracker: LandmarkTracker<LandmarkResult>,
}

impl HandTracker {
    /// Creates a hand tracker from a palm [`Detector`] and a hand landmark [`Estimator`].
    pub fn new(detector: Detector, estimator: Estimator<LandmarkResult>) -> anyhow::Result<Self> {
        Ok(Self {
            detector,
            tracker: LandmarkTracker::new(estimator)?,
        })
    }

    /// Loads both hand networks of `variant` from `model_dir`.
    pub fn load(model_dir: &Path, variant: ModelVariant) -> anyhow::Result<Self> {
        let detector = palm_detector(PalmDetectionNetwork::load(model_dir, variant)?);
        let estimator = Estimator::new(HandLandmarkNetwork::load(model_dir, variant)?);
        Self::new(detector, estimator)
    }

    /// Sets the minimum confidence of palm detections.
    pub fn set_detection_threshold(&mut self, thresh: f32) {
        self.detector.set_threshold(thresh);
    }

    /// Sets the minimum hand presence score needed to keep tracking a hand.
    pub fn set_tracking_threshold(&mut self, thresh: f32) {
        self.tracker.set_loss_threshold(thresh);
    }

    /// Smooths landmark positions across frames with an exponential moving average.
    ///
    /// `alpha` is the weight of the newest frame, so 1.0 disables smoothing.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not between 0.0 and 1.0.
    pub fn set_smoothing(&mut self, alpha: f32) {
        self.tracker
            .estimator_mut()
            .set_filter(LandmarkFilter::new(Ema::new(alpha), NUM_LANDMARKS));
    }

    /// Returns whether a hand is currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.tracker.roi().is_some()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        self.detector.timers().chain(self.tracker.timers())
    }

    /// Processes a frame, returning the hand in it, if any.
    ///
    /// Consecutive calls must pass frames of the same size.
    pub fn track(&mut self, image: &Image) -> anyhow::Result<Option<HandData>> {
        if !self.is_tracking() {
            let detections = self.detector.detect(image)?;
            // Detections are ordered by descending confidence.
            let Some(palm) = detections.first() else {
                return Ok(None);
            };
            log::debug!(
                "palm detected with confidence {:.2}, starting to track",
                palm.confidence()
            );
            self.tracker.set_roi(hand_roi(palm));
        }

        match self.tracker.track(image)? {
            Some(result) => Ok(Some(HandData {
                landmarks: result.estimate().clone(),
                view_rect: result.view_rect(),
            })),
            None => {
                log::debug!("hand lost");
                Ok(None)
            }
        }
    }
}

/// Derives the region of interest of the whole hand from a palm detection.
///
/// The palm rectangle is rotated by the detection angle, moved by half its height towards the
/// fingers, and enlarged.
fn hand_roi(palm: &Detection) -> RotatedRect {
    let rect = palm.bounding_rect();
    let palm = RotatedRect::new(rect, palm.angle());
    // Top center of the palm rectangle, in its own rotated frame.
    let [x, y] = palm.transform_out([rect.width() * 0.5, 0.0]);
    let hand = Rect::from_center(x, y, rect.width(), rect.height()).scale(PALM_TO_HAND_SCALE);
    RotatedRect::new(hand, palm.rotation_radians())
}
