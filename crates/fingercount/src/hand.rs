//! Hand detection, landmark estimation and finger counting.
//!
//! Hands are found by a palm detection network ([`detection`]), then followed from frame to frame
//! by the hand landmark network ([`landmark`]) driven by the [`tracking::HandTracker`]. The
//! resulting 21 landmarks feed the finger-counting heuristic in [`fingers`].

use std::{fmt, path::Path, str::FromStr};

use anyhow::bail;

use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork};

pub mod detection;
pub mod fingers;
pub mod landmark;
pub mod tracking;

/// Selects between the two sizes of the hand networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    /// Faster, less accurate networks.
    #[default]
    Lite,
    /// Slower, more accurate networks.
    Full,
}

impl ModelVariant {
    fn suffix(self) -> &'static str {
        match self {
            ModelVariant::Lite => "lite",
            ModelVariant::Full => "full",
        }
    }

    /// File name of the palm detection model of this variant.
    pub fn palm_detection_file(self) -> String {
        format!("palm_detection_{}.onnx", self.suffix())
    }

    /// File name of the hand landmark model of this variant.
    pub fn hand_landmark_file(self) -> String {
        format!("hand_landmark_{}.onnx", self.suffix())
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

impl FromStr for ModelVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lite" => Ok(ModelVariant::Lite),
            "full" => Ok(ModelVariant::Full),
            _ => bail!("unknown model variant '{s}' (expected 'lite' or 'full')"),
        }
    }
}

/// Loads an RGB image CNN with NCHW layout and inputs in range `0.0..=1.0`, as used by both hand
/// networks.
///
/// If `outputs` is given, only those network outputs are computed.
fn load_cnn(path: &Path, outputs: Option<&[usize]>) -> anyhow::Result<Cnn> {
    log::debug!("loading {}", path.display());
    let mut loader = NeuralNetwork::from_path(path)?;
    if let Some(outputs) = outputs {
        loader = loader.with_output_selection(outputs);
    }
    let nn = loader.load()?;
    Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))
}
