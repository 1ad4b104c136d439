//! Counting extended fingers.
//!
//! The heuristic works on integer pixel coordinates and assumes an upright right hand facing the
//! camera (or a left hand in a mirrored image):
//!
//! - the thumb is extended if its tip is further right than the joint below it,
//! - any other finger is extended if its tip is higher up than the joint two below it.

use std::ops::Index;

use super::landmark::{LandmarkResult, NUM_LANDMARKS};

/// Landmark indices of the five fingertips, thumb first.
pub const TIP_IDS: [usize; 5] = [4, 8, 12, 16, 20];

/// The fingers of a hand, in landmark order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Returns the landmark index of this finger's tip.
    pub fn tip_id(self) -> usize {
        TIP_IDS[self as usize]
    }
}

/// A landmark in whole pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelLandmark {
    pub id: usize,
    pub x: i32,
    pub y: i32,
}

/// The landmarks of one hand, in whole pixel coordinates.
///
/// Empty when no hand was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandmarkList {
    landmarks: Vec<PixelLandmark>,
}

impl LandmarkList {
    /// Creates an empty list, representing "no hand".
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the list from 2D positions, truncating coordinates toward zero.
    pub fn from_positions<I: IntoIterator<Item = [f32; 2]>>(positions: I) -> Self {
        Self {
            landmarks: positions
                .into_iter()
                .enumerate()
                .map(|(id, [x, y])| PixelLandmark {
                    id,
                    x: x as i32,
                    y: y as i32,
                })
                .collect(),
        }
    }

    /// Builds the list from the landmarks estimated for a hand.
    pub fn from_result(result: &LandmarkResult) -> Self {
        Self::from_positions(result.landmark_positions().map(|[x, y, _]| [x, y]))
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PixelLandmark> + '_ {
        self.landmarks.iter()
    }
}

impl Index<usize> for LandmarkList {
    type Output = PixelLandmark;

    fn index(&self, index: usize) -> &PixelLandmark {
        &self.landmarks[index]
    }
}

impl FromIterator<PixelLandmark> for LandmarkList {
    fn from_iter<T: IntoIterator<Item = PixelLandmark>>(iter: T) -> Self {
        Self {
            landmarks: iter.into_iter().collect(),
        }
    }
}

/// Which fingers of a hand are extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerState {
    extended: [bool; 5],
}

impl FingerState {
    /// Classifies each finger in `list` as extended or not.
    ///
    /// Returns [`None`] if `list` does not contain a full hand.
    pub fn classify(list: &LandmarkList) -> Option<Self> {
        if list.len() < NUM_LANDMARKS {
            return None;
        }

        let extended = Finger::ALL.map(|finger| {
            let tip = finger.tip_id();
            match finger {
                Finger::Thumb => list[tip].x > list[tip - 1].x,
                _ => list[tip].y < list[tip - 2].y,
            }
        });
        Some(Self { extended })
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        self.extended[finger as usize]
    }

    /// Returns one flag per finger, thumb first: 1 if extended, 0 if not.
    pub fn flags(&self) -> [u8; 5] {
        self.extended.map(u8::from)
    }

    /// Returns the number of extended fingers.
    pub fn count(&self) -> usize {
        self.extended.iter().filter(|&&ext| ext).count()
    }
}

/// Returns the text displayed for `count` extended fingers.
pub fn label(count: usize) -> String {
    match count {
        0 => "No Finger".to_string(),
        n => format!("{n} Finger"),
    }
}
