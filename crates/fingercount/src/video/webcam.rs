//! Webcam capture through V4L2.
//!
//! Only capture devices that deliver JPEG or Motion-JPEG frames are used.

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::num::TotalF32;
use crate::timer::Timer;

/// Which capture parameter wins when the camera cannot satisfy both.
///
/// Among the modes that satisfy all requirements, the preferred parameter also decides the
/// ranking: the resolution closest to the requested one, or the highest frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    #[default]
    Resolution,
    Framerate,
}

/// Requirements for the capture mode: an exact resolution and a minimum frame rate.
#[derive(Debug, Default, Clone, Copy)]
struct Constraints {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    prefer: ParamPreference,
}

impl Constraints {
    fn accepts(&self, mode: &Mode) -> bool {
        let res_ok = self.resolution.map_or(true, |res| mode.resolution == res);
        let fps_ok = self
            .fps
            .map_or(true, |min| mode.fps().round() >= min as f32);
        res_ok && fps_ok
    }

    /// Drops one requirement, the non-preferred one first. Returns `false` if none were left.
    fn relax(&mut self) -> bool {
        match self.prefer {
            ParamPreference::Resolution => {
                self.fps.take().is_some() || self.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                self.resolution.take().is_some() || self.fps.take().is_some()
            }
        }
    }
}

/// Builder for [`Webcam::open`].
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    constraints: Constraints,
}

impl WebcamOptions {
    /// Only opens the device whose V4L2 card name is `name`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requests frames of exactly `resolution`. If the camera cannot deliver it, the closest
    /// resolution it offers is used.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.constraints.resolution = Some(resolution);
        self
    }

    /// Requests at least `fps` frames per second. Dropped if the camera cannot deliver it.
    pub fn fps(mut self, fps: u32) -> Self {
        self.constraints.fps = Some(fps);
        self
    }

    pub fn prefer(mut self, prefer: ParamPreference) -> Self {
        self.constraints.prefer = prefer;
        self
    }
}

/// A frame size and rate the camera offers.
#[derive(Debug, Clone, Copy)]
struct Mode {
    resolution: Resolution,
    interval: Fract,
}

impl Mode {
    fn fps(&self) -> f32 {
        self.interval.as_f32().recip()
    }
}

/// How well `mode` matches the `wanted` resolution. Higher is better.
///
/// Without a wanted resolution, larger frames score higher.
fn resolution_score(mode: &Mode, wanted: Option<Resolution>) -> TotalF32 {
    let res = mode.resolution;
    match wanted {
        Some(wanted) => {
            let dw = res.width().abs_diff(wanted.width());
            let dh = res.height().abs_diff(wanted.height());
            TotalF32(-((dw + dh) as f32))
        }
        None => TotalF32(res.num_pixels() as f32),
    }
}

/// Chooses a mode satisfying `constraints`, relaxing them until one does.
///
/// The requested resolution keeps ranking the modes after it was relaxed, so the closest one wins.
fn choose_mode(modes: &[Mode], requested: Constraints) -> Option<Mode> {
    let mut constraints = requested;
    loop {
        let best = modes
            .iter()
            .filter(|mode| constraints.accepts(mode))
            .max_by_key(|mode| {
                let res = resolution_score(mode, requested.resolution);
                let fps = TotalF32(mode.fps());
                match constraints.prefer {
                    ParamPreference::Resolution => (res, fps),
                    ParamPreference::Framerate => (fps, res),
                }
            });
        if best.is_some() {
            return best.copied();
        }

        log::debug!("no capture mode satisfies {constraints:?}");
        if !constraints.relax() {
            return None;
        }
    }
}

fn list_modes(device: &Device, format: Pixelformat) -> anyhow::Result<Vec<Mode>> {
    let FrameSizes::Discrete(sizes) = device.frame_sizes(format)? else {
        bail!("only discrete frame sizes are supported");
    };

    let mut modes = Vec::new();
    for size in sizes {
        let (w, h) = (size.width(), size.height());
        let FrameIntervals::Discrete(intervals) = device.frame_intervals(format, w, h)? else {
            bail!("only discrete frame intervals are supported");
        };
        modes.extend(intervals.into_iter().map(|interval| Mode {
            resolution: Resolution::new(w, h),
            interval: *interval.fract(),
        }));
    }
    Ok(modes)
}

fn jpeg_format(device: &Device) -> anyhow::Result<Option<Pixelformat>> {
    for desc in device.formats(BufType::VIDEO_CAPTURE) {
        let format = desc?.pixelformat();
        if matches!(format, Pixelformat::JPEG | Pixelformat::MJPG) {
            return Ok(Some(format));
        }
    }
    Ok(None)
}

/// A V4L2 camera delivering decoded frames.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first capture device that matches `options` and delivers JPEG frames.
    ///
    /// May block while the camera starts up.
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        for device in linuxvideo::list()? {
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    log::warn!("skipping video device: {e}");
                    continue;
                }
            };
            match Self::try_open(device, &options) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("skipping video device: {e:#}"),
            }
        }

        match options.name {
            Some(name) => bail!("no usable webcam named '{name}'"),
            None => bail!("no usable webcam"),
        }
    }

    /// Returns `Ok(None)` for devices that are not a match.
    fn try_open(device: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = device.capabilities()?;
        let card = caps.card();
        if options.name.as_deref().map_or(false, |name| name != card) {
            return Ok(None);
        }
        let path = device.path()?;
        let flags = caps.device_capabilities();
        log::debug!("{card} ({}): {flags:?}", path.display());
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let Some(format) = jpeg_format(&device)? else {
            bail!("{card} does not offer JPEG frames");
        };
        let modes = list_modes(&device, format)?;
        let Some(mode) = choose_mode(&modes, options.constraints) else {
            bail!("{card} offers no capture modes");
        };

        let capture = device.video_capture(PixFormat::new(
            mode.resolution.width(),
            mode.resolution.height(),
            format,
        ))?;
        let resolution = Resolution::new(capture.format().width(), capture.format().height());
        let interval = capture.set_frame_interval(mode.interval)?;
        log::info!(
            "capturing from {card} ({}) at {resolution}, {:.1} FPS",
            path.display(),
            interval.as_f32().recip()
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Waits for the next frame and decodes it.
    ///
    /// A frame that fails to decode is logged and replaced with a blank frame, so errors only come
    /// from the device itself.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let waiting = self.t_dequeue.start();
        let (res, t_decode) = (self.resolution, &self.t_decode);
        let image = self.stream.dequeue(|buf| {
            drop(waiting);
            let _decoding = t_decode.start();
            let image = Image::decode_jpeg(&buf).unwrap_or_else(|e| {
                log::error!("corrupted webcam frame: {e:#}");
                Image::new(res.width(), res.height())
            });
            Ok(image)
        })?;
        Ok(image)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;

    use super::*;

    fn mode(width: u32, height: u32, fps: u32) -> Mode {
        Mode {
            resolution: Resolution::new(width, height),
            interval: Fract::new(1, fps),
        }
    }

    fn choose(
        resolution: Option<Resolution>,
        fps: Option<u32>,
        prefer: ParamPreference,
    ) -> (Resolution, u32) {
        let modes = [
            mode(1920, 1080, 5),
            mode(1280, 720, 10),
            mode(640, 480, 30),
            mode(640, 480, 15),
            mode(320, 240, 60),
        ];
        let constraints = Constraints {
            resolution,
            fps,
            prefer,
        };
        let mode = choose_mode(&modes, constraints).unwrap();
        (mode.resolution, mode.fps().round() as u32)
    }

    #[test]
    fn exact_match() {
        assert_eq!(
            choose(Some(Resolution::RES_480P), Some(30), ParamPreference::Resolution),
            (Resolution::RES_480P, 30)
        );
    }

    #[test]
    fn maximizes_preferred_parameter() {
        assert_eq!(
            choose(None, Some(10), ParamPreference::Resolution),
            (Resolution::RES_720P, 10)
        );
        assert_eq!(
            choose(Some(Resolution::new(320, 240)), None, ParamPreference::Framerate),
            (Resolution::new(320, 240), 60)
        );
    }

    #[test]
    fn relaxes_frame_rate_first_when_preferring_resolution() {
        assert_eq!(
            choose(Some(Resolution::RES_1080P), Some(30), ParamPreference::Resolution),
            (Resolution::RES_1080P, 5)
        );
    }

    #[test]
    fn relaxes_resolution_first_when_preferring_frame_rate() {
        assert_eq!(
            choose(Some(Resolution::RES_1080P), Some(30), ParamPreference::Framerate),
            (Resolution::new(320, 240), 60)
        );
    }

    #[test]
    fn default_config_keeps_480p() {
        let modes = [mode(1920, 1080, 30), mode(640, 480, 30)];
        let config = Config::default();
        let constraints = Constraints {
            resolution: Some(config.resolution),
            fps: Some(config.fps),
            prefer: ParamPreference::default(),
        };
        let mode = choose_mode(&modes, constraints).unwrap();
        assert_eq!(mode.resolution, Resolution::RES_480P);
    }

    #[test]
    fn falls_back_to_closest_resolution() {
        let modes = [mode(1920, 1080, 30), mode(1280, 720, 30), mode(640, 480, 30)];
        let constraints = Constraints {
            resolution: Some(Resolution::new(800, 600)),
            fps: Some(30),
            prefer: ParamPreference::Resolution,
        };
        let mode = choose_mode(&modes, constraints).unwrap();
        assert_eq!(mode.resolution, Resolution::RES_480P);

        // Also when the frame rate decides first.
        let constraints = Constraints {
            prefer: ParamPreference::Framerate,
            ..constraints
        };
        let mode = choose_mode(&modes, constraints).unwrap();
        assert_eq!(mode.resolution, Resolution::RES_480P);
    }

    #[test]
    fn no_modes() {
        assert!(choose_mode(&[], Constraints::default()).is_none());
    }

    #[test]
    fn options() {
        let opts = WebcamOptions::default()
            .name("Cam")
            .resolution(Resolution::RES_720P)
            .fps(60)
            .prefer(ParamPreference::Framerate);
        assert_eq!(opts.name.as_deref(), Some("Cam"));
        assert_eq!(opts.constraints.resolution, Some(Resolution::RES_720P));
        assert_eq!(opts.constraints.fps, Some(60));
        assert_eq!(opts.constraints.prefer, ParamPreference::Framerate);
    }
}
