//! The 21-point hand landmark network.

use std::path::Path;

use nalgebra::{Rotation2, Vector2};

use crate::image::{draw, Color, Image};
use crate::iter::zip_exact;
use crate::landmark::{Confidence, Estimate, Landmarks, Network};
use crate::nn::{Cnn, Outputs};

use super::ModelVariant;

pub const NUM_LANDMARKS: usize = 21;

/// Output of the [`HandLandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    /// Probability that the hand is a right hand, in an unmirrored image.
    right_hand: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        Self::new(Landmarks::new(NUM_LANDMARKS), 0.0)
    }
}

impl LandmarkResult {
    /// A result with the given landmarks and presence score, and unknown handedness.
    pub fn new(landmarks: Landmarks, presence: f32) -> Self {
        Self {
            landmarks,
            presence,
            right_hand: 0.0,
        }
    }

    /// Landmark positions in order of [`LandmarkIdx`].
    pub fn landmark_positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.landmarks.positions().iter().copied()
    }

    pub fn landmark_position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.landmarks.positions()[idx as usize]
    }

    /// How likely it is that the input actually shows a hand.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Clockwise angle between "up" and the direction from the wrist to the middle finger's
    /// knuckle. Zero for an upright hand.
    pub fn rotation_radians(&self) -> f32 {
        let [wx, wy, _] = self.landmark_position(LandmarkIdx::Wrist);
        let [mx, my, _] = self.landmark_position(LandmarkIdx::MiddleFingerMcp);
        let wrist_from_knuckle = Vector2::new(wx - mx, wy - my);
        Rotation2::rotation_between(&Vector2::y(), &wrist_from_knuckle).angle()
    }

    /// Only meaningful for unmirrored frames with a high [`presence`](Self::presence).
    pub fn handedness(&self) -> Handedness {
        match self.right_hand > 0.5 {
            true => Handedness::Right,
            false => Handedness::Left,
        }
    }

    /// Draws the bones in green and a marker on every landmark.
    pub fn draw(&self, target: &mut Image) {
        for chain in SKELETON {
            for pair in chain.windows(2) {
                let [ax, ay, _] = self.landmark_position(pair[0]);
                let [bx, by, _] = self.landmark_position(pair[1]);
                draw::line(target, ax as i32, ay as i32, bx as i32, by as i32)
                    .color(Color::GREEN);
            }
        }
        for [x, y, _] in self.landmark_positions() {
            draw::marker(target, x as i32, y as i32);
        }
    }
}

impl Estimate for LandmarkResult {
    fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }

    fn angle_radians(&self) -> Option<f32> {
        Some(self.rotation_radians())
    }
}

impl Confidence for LandmarkResult {
    fn confidence(&self) -> f32 {
        self.presence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Landmarks in network output order.
///
/// Joint names, from the wrist outwards: CMC (thumb base), MCP (knuckle), PIP and DIP (middle and
/// outer finger joints), IP (the thumb's only joint besides its MCP), and the tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Polylines through connected landmarks: the outline of the palm, then each finger.
pub const SKELETON: &[&[LandmarkIdx]] = {
    use LandmarkIdx::*;
    &[
        &[
            Wrist,
            ThumbCmc,
            IndexFingerMcp,
            MiddleFingerMcp,
            RingFingerMcp,
            PinkyMcp,
            Wrist,
        ],
        &[ThumbCmc, ThumbMcp, ThumbIp, ThumbTip],
        &[IndexFingerMcp, IndexFingerPip, IndexFingerDip, IndexFingerTip],
        &[MiddleFingerMcp, MiddleFingerPip, MiddleFingerDip, MiddleFingerTip],
        &[RingFingerMcp, RingFingerPip, RingFingerDip, RingFingerTip],
        &[PinkyMcp, PinkyPip, PinkyDip, PinkyTip],
    ]
};

/// Estimates hand landmarks on a 224x224 crop around a hand.
#[derive(Clone)]
pub struct HandLandmarkNetwork {
    cnn: Cnn,
}

impl HandLandmarkNetwork {
    pub fn load(model_dir: &Path, variant: ModelVariant) -> anyhow::Result<Self> {
        let path = model_dir.join(variant.hand_landmark_file());
        // Output 3 holds world-space landmarks, which are not needed.
        let cnn = super::load_cnn(&path, Some(&[0, 1, 2]))?;
        Ok(Self { cnn })
    }
}

impl Network for HandLandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    let coords = outputs.expect_shape(0, &[1, NUM_LANDMARKS * 3])?;
    let presence = outputs.expect_shape(1, &[1, 1])?;
    let right_hand = outputs.expect_shape(2, &[1, 1])?;

    let coords = coords.index([0]).as_slice().chunks_exact(3);
    for (position, xyz) in zip_exact(estimate.landmarks.positions_mut(), coords) {
        position.copy_from_slice(xyz);
    }
    estimate.presence = presence.index([0, 0]).as_singular();
    estimate.right_hand = right_hand.index([0, 0]).as_singular();
    Ok(())
}
