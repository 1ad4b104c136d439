//! Landmark regression on image regions, and following an object by its landmarks.
//!
//! An [`Estimator`] runs a landmark [`Network`] on one view of a frame. A [`LandmarkTracker`]
//! chooses that view: it keeps a rotated region of interest (RoI) around the object and moves it
//! to wherever the landmarks of the previous frame ended up.

use std::iter;

use anyhow::Context;

use crate::filter::Filter;
use crate::image::{AsImageView, AspectRatio, ImageView, Resolution, RotatedRect};
use crate::iter::zip_exact;
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

type Position = [f32; 3];

/// Relative padding added to each side of the landmark bounding box to get the next RoI.
const ROI_PADDING: f32 = 0.3;

/// A fixed number of 3D landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// `len` landmarks, all at the origin.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; len].into(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().copied().map(Landmark::new)
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn get(&self, index: usize) -> Landmark {
        Landmark::new(self.positions[index])
    }

    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.positions[index] = landmark.position();
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, f: impl FnMut(Position) -> Position) {
        let mapped = self.positions.iter().copied().map(f);
        self.positions = mapped.collect();
    }
}

/// One landmark. X and Y are pixels, Z is depth on roughly the scale of X.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark([f32; 3]);

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self(position)
    }

    pub fn position(&self) -> Position {
        self.0
    }

    pub fn x(&self) -> f32 {
        self.0[0]
    }

    pub fn y(&self) -> f32 {
        self.0[1]
    }

    pub fn z(&self) -> f32 {
        self.0[2]
    }
}

/// Smooths landmark positions over time.
///
/// The filter sees positions in network input coordinates, so its parameters do not depend on the
/// frame size.
pub struct LandmarkFilter {
    apply: Option<Box<dyn FnMut(&mut [Position]) + Send>>,
}

/// Leaves positions untouched.
impl Default for LandmarkFilter {
    fn default() -> Self {
        Self { apply: None }
    }
}

impl LandmarkFilter {
    /// Runs `filter` over every coordinate of `len` landmarks, keeping one filter state per
    /// coordinate.
    pub fn new<F>(filter: F, len: usize) -> Self
    where
        F: Filter<f32> + Send + 'static,
        F::State: Send,
    {
        let mut states: Vec<[F::State; 3]> =
            iter::repeat_with(Default::default).take(len).collect();
        Self {
            apply: Some(Box::new(move |positions| {
                for (position, states) in zip_exact(positions, &mut states) {
                    for (coord, state) in zip_exact(position, states) {
                        *coord = filter.filter(state, *coord);
                    }
                }
            })),
        }
    }

    /// # Panics
    ///
    /// Panics if `landmarks` is not as long as the `len` this filter was created with.
    pub fn filter(&mut self, landmarks: &mut Landmarks) {
        if let Some(apply) = &mut self.apply {
            apply(landmarks.positions_mut());
        }
    }
}

/// Network output holding landmarks.
pub trait Estimate: Send + Sync + 'static {
    fn landmarks(&self) -> &Landmarks;

    fn landmarks_mut(&mut self) -> &mut Landmarks;

    /// Clockwise rotation of the object relative to the input view, if the network yields one.
    ///
    /// The [`LandmarkTracker`] turns its RoI by this angle. [`None`] keeps the RoI's rotation.
    fn angle_radians(&self) -> Option<f32> {
        None
    }
}

/// Network output with a score for how likely the object is actually in the view.
pub trait Confidence {
    fn confidence(&self) -> f32;
}

/// A landmark regression network and the code to decode its outputs.
pub trait Network: Send + Sync + 'static {
    type Output: Estimate;

    fn cnn(&self) -> &Cnn;

    /// Decodes `outputs` into `estimate`, with landmarks in network input pixels.
    ///
    /// Fails if the outputs are not shaped the way the network is documented to produce them.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Runs a landmark [`Network`] and maps its results back onto the input view.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    filter: LandmarkFilter,
    t_infer: Timer,
    t_extract: Timer,
    t_filter: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            filter: LandmarkFilter::default(),
            t_infer: Timer::new("landmark infer"),
            t_extract: Timer::new("landmark extract"),
            t_filter: Timer::new("landmark filter"),
        }
    }
}

impl<E: Estimate> Estimator<E> {
    pub fn input_resolution(&self) -> Resolution {
        self.network.cnn().input_resolution()
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_filter].into_iter()
    }

    /// Replaces the filter applied to each estimate. Meant for consecutive video frames.
    pub fn set_filter(&mut self, filter: LandmarkFilter) {
        self.filter = filter;
    }

    /// Estimates landmarks in `image`, returning them in `image` coordinates.
    ///
    /// `image` is padded on two sides if its aspect ratio differs from the network input.
    pub fn estimate<V: AsImageView>(&mut self, image: &V) -> anyhow::Result<&mut E> {
        self.estimate_in(image.as_view())
    }

    fn estimate_in(&mut self, image: ImageView<'_>) -> anyhow::Result<&mut E> {
        let input_res = self.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .with_context(|| format!("landmark network input is empty ({input_res})"))?;
        let padded = image.rect().grow_to_fit_aspect(aspect);

        let cnn = self.network.cnn();
        let outputs = self.t_infer.time(|| cnn.estimate(&image.view(padded)))?;
        log::trace!("landmark network outputs: {:?}", outputs);

        let estimate = &mut self.estimate;
        {
            let _guard = self.t_extract.start();
            self.network.extract(&outputs, estimate)?;
        }
        {
            let _guard = self.t_filter.start();
            self.filter.filter(estimate.landmarks_mut());
        }

        let scale = padded.width() / input_res.width() as f32;
        let (dx, dy) = (padded.x(), padded.y());
        estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| [x * scale + dx, y * scale + dy, z * scale]);

        Ok(estimate)
    }
}

/// Follows one object across frames with a rotated region of interest.
///
/// The RoI has to be seeded with [`LandmarkTracker::set_roi`], usually from a detector. After
/// that, each frame's landmarks determine the next frame's RoI, until the estimate's
/// [`Confidence`] drops below the loss threshold.
pub struct LandmarkTracker<E: Estimate + Confidence> {
    estimator: Estimator<E>,
    input_aspect: AspectRatio,
    roi: Option<RotatedRect>,
    loss_threshold: f32,
}

impl<E: Estimate + Confidence> LandmarkTracker<E> {
    pub const DEFAULT_LOSS_THRESHOLD: f32 = 0.5;

    /// Fails if the estimator's network input is empty.
    pub fn new(estimator: Estimator<E>) -> anyhow::Result<Self> {
        let input_aspect = estimator
            .input_resolution()
            .aspect_ratio()
            .context("landmark network input is empty")?;
        Ok(Self {
            estimator,
            input_aspect,
            roi: None,
            loss_threshold: Self::DEFAULT_LOSS_THRESHOLD,
        })
    }

    pub fn estimator_mut(&mut self) -> &mut Estimator<E> {
        &mut self.estimator
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> {
        self.estimator.timers()
    }

    /// Estimates with a confidence below `threshold` end tracking.
    pub fn set_loss_threshold(&mut self, threshold: f32) {
        self.loss_threshold = threshold;
    }

    /// The RoI for the next frame, or [`None`] if nothing is tracked.
    pub fn roi(&self) -> Option<&RotatedRect> {
        self.roi.as_ref()
    }

    /// Starts (or redirects) tracking at `roi`. The RoI is used as-is, without padding.
    pub fn set_roi(&mut self, roi: impl Into<RotatedRect>) {
        self.roi = Some(roi.into());
    }

    /// Estimates landmarks in the RoI of `frame` and moves the RoI along with them.
    ///
    /// Returns `Ok(None)` if there is no RoI or the object was lost in this frame. All frames must
    /// have the same size.
    pub fn track<V: AsImageView>(
        &mut self,
        frame: &V,
    ) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        self.track_in(frame.as_view())
    }

    fn track_in(&mut self, frame: ImageView<'_>) -> anyhow::Result<Option<TrackingResult<'_, E>>> {
        let Some(roi) = self.roi else {
            return Ok(None);
        };

        let view_rect = roi.grow_to_fit_aspect(self.input_aspect);
        let estimate = self.estimator.estimate(&frame.view(view_rect))?;
        let confidence = estimate.confidence();
        if confidence < self.loss_threshold {
            log::trace!(
                "tracking lost: confidence {confidence} < {}",
                self.loss_threshold
            );
            self.roi = None;
            return Ok(None);
        }

        let view_angle = estimate.angle_radians();
        let next_roi = follow_landmarks(view_rect, estimate.landmarks_mut(), view_angle)
            .context("landmark network returned no landmarks")?;
        self.roi = Some(next_roi);

        Ok(Some(TrackingResult {
            view_rect,
            estimate,
        }))
    }
}

/// Moves `landmarks` from the coordinates of `view_rect` into frame coordinates and returns the
/// RoI enclosing them.
///
/// `view_angle` is the object's rotation as seen in the view, so it is relative to `view_rect`.
/// Returns [`None`] if there are no landmarks.
fn follow_landmarks(
    view_rect: RotatedRect,
    landmarks: &mut Landmarks,
    view_angle: Option<f32>,
) -> Option<RotatedRect> {
    let radians = view_rect.rotation_radians() + view_angle.unwrap_or(0.0);
    for [x, y, _] in landmarks.positions_mut() {
        [*x, *y] = view_rect.transform_out([*x, *y]);
    }
    let bounds = RotatedRect::bounding(radians, landmarks.iter().map(|lm| [lm.x(), lm.y()]))?;
    Some(bounds.grow_rel(ROI_PADDING))
}

/// Landmarks found by [`LandmarkTracker::track`].
pub struct TrackingResult<'a, E: Estimate> {
    view_rect: RotatedRect,
    estimate: &'a E,
}

impl<'a, E: Estimate> TrackingResult<'a, E> {
    /// The part of the frame that was given to the network.
    pub fn view_rect(&self) -> RotatedRect {
        self.view_rect
    }

    /// The estimate, with landmarks in frame coordinates.
    pub fn estimate(&self) -> &'a E {
        self.estimate
    }
}
