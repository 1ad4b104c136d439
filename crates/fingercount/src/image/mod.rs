//! Frames and the geometry used to cut regions out of them.
//!
//! Camera frames are stored as [`Image`]s. The networks never read an [`Image`] directly, they
//! sample an [`ImageView`], which is a rotated rectangle of the frame. This is how the hand RoI
//! follows the hand's rotation.

pub mod draw;
mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageFormat, Rgba, RgbaImage};

pub use rect::{Rect, RotatedRect};
pub use resolution::{AspectRatio, Resolution};

/// An RGBA8 frame.
///
/// The pixel layout matches `Rgba8UnormSrgb` textures, so frames are uploaded to the GPU as-is.
#[derive(Clone)]
pub struct Image {
    pixels: RgbaImage,
}

impl Image {
    /// Creates a `width` by `height` image filled with [`Color::NULL`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    /// Wraps row-major RGBA8 pixel data.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not hold exactly `res.width() * res.height()` pixels.
    pub fn from_rgba8(res: Resolution, data: &[u8]) -> Self {
        let expected = res.width() as usize * res.height() as usize * 4;
        let pixels = RgbaImage::from_raw(res.width(), res.height(), data.to_vec())
            .filter(|_| data.len() == expected);
        match pixels {
            Some(pixels) => Self { pixels },
            None => panic!("{} bytes of pixel data do not make a {res} image", data.len()),
        }
    }

    /// Decodes a JPEG image, like the frames of an MJPG camera stream.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let pixels = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.into_rgba8();
        Ok(Self { pixels })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The rectangle covering the whole image, with its top left corner at the origin.
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.pixels.get_pixel(x, y).0)
    }

    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels.put_pixel(x, y, Rgba(color.0));
    }

    /// Returns a view of the area `rect` of this image.
    ///
    /// The view has the size of `rect`. Where `rect` extends past the image, the view reads
    /// [`Color::NULL`].
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'_> {
        ImageView {
            image: self,
            area: rect.into(),
        }
    }

    /// Mirrors the image left to right.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.pixels);
    }

    pub fn clear(&mut self, color: Color) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = Rgba(color.0);
        }
    }

    /// Row-major RGBA8 pixel data.
    pub fn data(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("resolution", &self.resolution())
            .finish_non_exhaustive()
    }
}

/// A rotated rectangular area of an [`Image`], addressed in its own pixel coordinates.
#[derive(Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    /// Covered area, in coordinates of `image`.
    area: RotatedRect,
}

impl<'a> ImageView<'a> {
    pub fn width(&self) -> u32 {
        self.area.rect().width() as u32
    }

    pub fn height(&self) -> u32 {
        self.area.rect().height() as u32
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// The rectangle covering the whole view, in view coordinates.
    pub fn rect(&self) -> Rect {
        let area = self.area.rect();
        Rect::from_top_left(0.0, 0.0, area.width(), area.height())
    }

    /// The area of the underlying [`Image`] this view shows.
    pub fn image_area(&self) -> RotatedRect {
        self.area
    }

    /// Samples the nearest image pixel to view pixel `(x, y)`, or [`Color::NULL`] if it is
    /// outside of the image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        let [ix, iy] = self.area.transform_out([x as f32 + 0.5, y as f32 + 0.5]);
        let (ix, iy) = ((ix - 0.5).round(), (iy - 0.5).round());
        let inside = (0.0..self.image.width() as f32).contains(&ix)
            && (0.0..self.image.height() as f32).contains(&iy);
        if inside {
            self.image.get(ix as u32, iy as u32)
        } else {
            Color::NULL
        }
    }

    /// Returns a view of the area `rect` of this view.
    ///
    /// `rect` is in view coordinates and may reach outside of this view, into the rest of the
    /// image.
    pub fn view(&self, rect: impl Into<RotatedRect>) -> ImageView<'a> {
        let rect: RotatedRect = rect.into();
        let [cx, cy] = self.area.transform_out(rect.center());
        let size = rect.rect();
        ImageView {
            image: self.image,
            area: RotatedRect::new(
                Rect::from_center(cx, cy, size.width(), size.height()),
                self.area.rotation_radians() + rect.rotation_radians(),
            ),
        }
    }

    pub fn to_image(&self) -> Image {
        let mut image = Image::new(self.width(), self.height());
        for (x, y, pixel) in image.pixels.enumerate_pixels_mut() {
            *pixel = Rgba(self.get(x, y).0);
        }
        image
    }
}

impl fmt::Debug for ImageView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageView")
            .field("area", &self.area)
            .finish_non_exhaustive()
    }
}

/// A non-premultiplied sRGB color with alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Transparent black. Views read this outside of their image.
    pub const NULL: Self = Self([0; 4]);
    pub const BLACK: Self = Self::from_rgb8(0, 0, 0);
    pub const WHITE: Self = Self::from_rgb8(255, 255, 255);
    pub const RED: Self = Self::from_rgb8(255, 0, 0);
    pub const GREEN: Self = Self::from_rgb8(0, 255, 0);
    pub const BLUE: Self = Self::from_rgb8(0, 0, 255);

    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    /// The color channels without alpha.
    pub fn rgb(&self) -> [u8; 3] {
        let [r, g, b, _] = self.0;
        [r, g, b]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Image data that can be read through an [`ImageView`].
///
/// Estimators and detectors take `impl AsImageView` so callers can pass a whole frame or a part of
/// one.
pub trait AsImageView {
    fn as_view(&self) -> ImageView<'_>;
}

impl AsImageView for Image {
    fn as_view(&self) -> ImageView<'_> {
        self.view(self.rect())
    }
}

impl AsImageView for ImageView<'_> {
    fn as_view(&self) -> ImageView<'_> {
        *self
    }
}

impl<V: AsImageView + ?Sized> AsImageView for &V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}

impl<V: AsImageView + ?Sized> AsImageView for &mut V {
    fn as_view(&self) -> ImageView<'_> {
        (**self).as_view()
    }
}
