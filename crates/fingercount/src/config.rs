//! Runtime configuration from environment variables.

use std::{
    env,
    fmt::{Debug, Display},
    path::PathBuf,
    str::FromStr,
};

use anyhow::{bail, Context};

use crate::hand::ModelVariant;
use crate::image::Resolution;

pub const WEBCAM_NAME: &str = "FINGERCOUNT_WEBCAM_NAME";
pub const RESOLUTION: &str = "FINGERCOUNT_RESOLUTION";
pub const FPS: &str = "FINGERCOUNT_FPS";
pub const MODEL_DIR: &str = "FINGERCOUNT_MODEL_DIR";
pub const MODEL: &str = "FINGERCOUNT_MODEL";
pub const MIN_DETECTION_CONFIDENCE: &str = "FINGERCOUNT_MIN_DETECTION_CONFIDENCE";
pub const MIN_TRACKING_CONFIDENCE: &str = "FINGERCOUNT_MIN_TRACKING_CONFIDENCE";
pub const MIRROR: &str = "FINGERCOUNT_MIRROR";
pub const QUIT_KEY: &str = "FINGERCOUNT_QUIT_KEY";
pub const SMOOTHING: &str = "FINGERCOUNT_SMOOTHING";

/// Settings of the finger counter.
///
/// Every field has a default and can be overridden by the environment variable named after it
/// (see the constants in this module).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// V4L2 card name of the camera to open. [`None`] selects the first usable device.
    pub webcam_name: Option<String>,
    pub resolution: Resolution,
    pub fps: u32,
    pub model_dir: PathBuf,
    pub model: ModelVariant,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    /// Flip frames horizontally before processing (selfie view).
    pub mirror: bool,
    pub quit_key: char,
    /// EMA weight of new landmark positions. [`None`] disables smoothing.
    pub smoothing: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webcam_name: None,
            resolution: Resolution::RES_480P,
            fps: 30,
            model_dir: PathBuf::from("3rdparty/onnx"),
            model: ModelVariant::Lite,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            mirror: false,
            quit_key: 'q',
            smoothing: None,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Reads the configuration from a variable lookup function.
    ///
    /// Unset and empty variables keep their default value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |var: &str| lookup(var).filter(|val| !val.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = get(WEBCAM_NAME) {
            config.webcam_name = Some(name);
        }
        if let Some(res) = get(RESOLUTION) {
            config.resolution = parse(RESOLUTION, &res)?;
        }
        if let Some(fps) = get(FPS) {
            config.fps = parse(FPS, &fps)?;
            if config.fps == 0 {
                bail!("{FPS} must be greater than zero");
            }
        }
        if let Some(dir) = get(MODEL_DIR) {
            config.model_dir = PathBuf::from(dir);
        }
        if let Some(model) = get(MODEL) {
            config.model = parse(MODEL, &model)?;
        }
        if let Some(conf) = get(MIN_DETECTION_CONFIDENCE) {
            config.min_detection_confidence = parse_unit_interval(MIN_DETECTION_CONFIDENCE, &conf)?;
        }
        if let Some(conf) = get(MIN_TRACKING_CONFIDENCE) {
            config.min_tracking_confidence = parse_unit_interval(MIN_TRACKING_CONFIDENCE, &conf)?;
        }
        if let Some(mirror) = get(MIRROR) {
            config.mirror = parse_bool(MIRROR, &mirror)?;
        }
        if let Some(key) = get(QUIT_KEY) {
            let key = key.trim();
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => config.quit_key = c,
                _ => bail!("{QUIT_KEY} must be a single character, got '{key}'"),
            }
        }
        if let Some(alpha) = get(SMOOTHING) {
            let alpha = parse_unit_interval(SMOOTHING, &alpha)?;
            if alpha == 0.0 {
                bail!("{SMOOTHING} must be greater than zero");
            }
            config.smoothing = Some(alpha);
        }

        Ok(config)
    }
}

fn parse<T>(var: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Debug + Display + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("invalid value '{value}' for {var}"))
}

fn parse_unit_interval(var: &str, value: &str) -> anyhow::Result<f32> {
    let conf: f32 = parse(var, value)?;
    if !(0.0..=1.0).contains(&conf) {
        bail!("{var} must be between 0.0 and 1.0, got {conf}");
    }
    Ok(conf)
}

fn parse_bool(var: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid value '{value}' for {var} (expected true or false)"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.resolution, Resolution::new(640, 480));
        assert_eq!(config.fps, 30);
        assert_eq!(config.quit_key, 'q');
        assert!(!config.mirror);
        assert_eq!(config.model_dir, PathBuf::from("3rdparty/onnx"));
        assert_eq!(config.smoothing, None);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            (WEBCAM_NAME, "HD Webcam"),
            (RESOLUTION, "1280x720"),
            (FPS, "60"),
            (MODEL_DIR, "/opt/models"),
            (MODEL, "full"),
            (MIN_DETECTION_CONFIDENCE, "0.7"),
            (MIN_TRACKING_CONFIDENCE, "0.25"),
            (MIRROR, "yes"),
            (QUIT_KEY, "x"),
            (SMOOTHING, "0.6"),
        ])
        .unwrap();

        assert_eq!(config.webcam_name.as_deref(), Some("HD Webcam"));
        assert_eq!(config.resolution, Resolution::RES_720P);
        assert_eq!(config.fps, 60);
        assert_eq!(config.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.model, ModelVariant::Full);
        assert_eq!(config.min_detection_confidence, 0.7);
        assert_eq!(config.min_tracking_confidence, 0.25);
        assert!(config.mirror);
        assert_eq!(config.quit_key, 'x');
        assert_eq!(config.smoothing, Some(0.6));
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = config(&[(FPS, ""), (QUIT_KEY, "  ")]).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn errors_name_the_variable() {
        for (var, value) in [
            (RESOLUTION, "big"),
            (FPS, "0"),
            (FPS, "fast"),
            (MODEL, "huge"),
            (MIN_DETECTION_CONFIDENCE, "1.5"),
            (MIN_TRACKING_CONFIDENCE, "-0.1"),
            (MIRROR, "maybe"),
            (QUIT_KEY, "qq"),
            (SMOOTHING, "0"),
            (SMOOTHING, "2"),
        ] {
            let err = config(&[(var, value)]).unwrap_err();
            assert!(format!("{err:#}").contains(var), "{var}={value}: {err:#}");
        }
    }
}
