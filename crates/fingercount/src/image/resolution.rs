use std::{fmt, str::FromStr};

use anyhow::{bail, Context};

use super::Rect;

/// Width and height of an image or network input, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    pub const RES_480P: Self = Self::new(640, 480);
    pub const RES_720P: Self = Self::new(1280, 720);
    pub const RES_1080P: Self = Self::new(1920, 1080);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn num_pixels(&self) -> u32 {
        self.width * self.height
    }

    /// Returns the reduced aspect ratio of this resolution.
    ///
    /// Returns [`None`] if the width or height is 0.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }

    /// Computes the largest [`Rect`] with the given aspect ratio that fits centered inside `self`.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> Rect {
        let (w, h) = (self.width as f32, self.height as f32);
        let target = ratio.as_f32();
        let (fit_w, fit_h) = if w / h > target {
            (h * target, h)
        } else {
            (w, w / target)
        };

        Rect::from_center(w / 2.0, h / 2.0, fit_w, fit_h)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((w, h)) = s.trim().split_once(['x', 'X']) else {
            bail!("invalid resolution '{s}' (expected format 'WIDTHxHEIGHT')");
        };
        let width = w
            .parse()
            .with_context(|| format!("invalid width in resolution '{s}'"))?;
        let height = h
            .parse()
            .with_context(|| format!("invalid height in resolution '{s}'"))?;
        if width == 0 || height == 0 {
            bail!("resolution '{s}' must not have a zero dimension");
        }
        Ok(Self::new(width, height))
    }
}

/// A reduced ratio of width to height.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AspectRatio {
    num: u32,
    denom: u32,
}

impl AspectRatio {
    pub const SQUARE: Self = Self { num: 1, denom: 1 };

    /// Creates a reduced aspect ratio of `width` to `height`.
    ///
    /// Returns [`None`] if either argument is 0.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            num: width / gcd,
            denom: height / gcd,
        })
    }

    pub fn as_f32(&self) -> f32 {
        self.num as f32 / self.denom as f32
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.denom)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.num, self.denom)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(640, 480), 160);
        assert_eq!(gcd(7, 3), 1);
        assert_eq!(gcd(5, 5), 5);
    }

    #[test]
    fn aspect_ratio_is_reduced() {
        assert_eq!(AspectRatio::new(640, 480).unwrap().to_string(), "4:3");
        assert_eq!(AspectRatio::new(1920, 1080).unwrap().to_string(), "16:9");
        assert_eq!(AspectRatio::new(192, 192), Some(AspectRatio::SQUARE));
        assert_eq!(AspectRatio::new(0, 10), None);
        assert_eq!(Resolution::new(10, 0).aspect_ratio(), None);
    }

    #[test]
    fn fit_aspect() {
        assert_eq!(
            Resolution::new(16, 8).fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(4.0, 0.0, 8.0, 8.0),
        );
        assert_eq!(
            Resolution::new(8, 16).fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(0.0, 4.0, 8.0, 8.0),
        );
        assert_eq!(
            Resolution::new(8, 8).fit_aspect_ratio(AspectRatio::SQUARE),
            Rect::from_top_left(0.0, 0.0, 8.0, 8.0),
        );
    }

    #[test]
    fn parse_resolution() {
        assert_eq!("640x480".parse::<Resolution>().unwrap(), Resolution::RES_480P);
        assert_eq!(" 1280X720 ".parse::<Resolution>().unwrap(), Resolution::RES_720P);
        assert!("640".parse::<Resolution>().is_err());
        assert!("640x".parse::<Resolution>().is_err());
        assert!("0x480".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Resolution::new(192, 224).to_string(), "192x224");
    }
}
