//! Overlay drawing.
//!
//! Each function here returns a builder that holds the image. Options are set on the builder, and
//! the shape is rendered when the builder goes out of scope:
//!
//! ```ignore
//! draw::line(&mut image, 0, 0, 10, 10).color(Color::GREEN).stroke_width(2);
//! ```

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Line, PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};
use itertools::Itertools;

use super::{Color, Image, RotatedRect};

/// Draws an `X` centered on `(x, y)`, for landmarks and keypoints.
pub fn marker(image: &mut Image, x: i32, y: i32) -> DrawMarker<'_> {
    DrawMarker {
        canvas: Canvas(image),
        center: Point::new(x, y),
        color: Color::RED,
        size: 5,
    }
}

/// Draws a straight line between two pixels, both included.
pub fn line(image: &mut Image, start_x: i32, start_y: i32, end_x: i32, end_y: i32) -> DrawLine<'_> {
    DrawLine {
        canvas: Canvas(image),
        line: Line::new(Point::new(start_x, start_y), Point::new(end_x, end_y)),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws the four edges of `rect`.
pub fn rotated_rect(image: &mut Image, rect: RotatedRect) -> DrawRotatedRect<'_> {
    DrawRotatedRect {
        image,
        rect,
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Draws `text` in a 10x20 monospace font.
///
/// Unless aligned otherwise, the text is centered on `(x, y)` in both directions.
pub fn text<'a>(image: &'a mut Image, x: i32, y: i32, text: &'a str) -> DrawText<'a> {
    DrawText {
        canvas: Canvas(image),
        anchor: Point::new(x, y),
        text,
        color: Color::RED,
        scale: 1,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

pub struct DrawMarker<'a> {
    canvas: Canvas<'a>,
    center: Point,
    color: Color,
    size: u32,
}

impl DrawMarker<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Width and height of the `X` in pixels. Defaults to 5.
    ///
    /// # Panics
    ///
    /// Panics unless `size` is odd, so that the marker has a center pixel.
    pub fn size(&mut self, size: u32) -> &mut Self {
        assert!(size % 2 == 1, "marker size must be odd, got {size}");
        self.size = size;
        self
    }
}

impl Drop for DrawMarker<'_> {
    fn drop(&mut self) {
        let reach = (self.size / 2) as i32;
        let (center, color) = (self.center, self.color);
        let pixels = (-reach..=reach).flat_map(|d| {
            [
                Pixel(center + Point::new(d, d), color),
                Pixel(center + Point::new(d, -d), color),
            ]
        });
        infallible(self.canvas.draw_iter(pixels));
    }
}

pub struct DrawLine<'a> {
    canvas: Canvas<'a>,
    line: Line,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_stroke(self.color, self.stroke_width);
        infallible(self.line.into_styled(style).draw(&mut self.canvas));
    }
}

pub struct DrawRotatedRect<'a> {
    image: &'a mut Image,
    rect: RotatedRect,
    color: Color,
    stroke_width: u32,
}

impl DrawRotatedRect<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Defaults to 1.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRotatedRect<'_> {
    fn drop(&mut self) {
        let corners = self
            .rect
            .rotated_corners()
            .map(|[x, y]| (x.round() as i32, y.round() as i32));
        for ((x0, y0), (x1, y1)) in corners.into_iter().circular_tuple_windows() {
            line(self.image, x0, y0, x1, y1)
                .color(self.color)
                .stroke_width(self.stroke_width);
        }
    }
}

pub struct DrawText<'a> {
    canvas: Canvas<'a>,
    anchor: Point,
    text: &'a str,
    color: Color,
    scale: u32,
    alignment: Alignment,
    baseline: Baseline,
}

impl DrawText<'_> {
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Draws each font pixel as a `scale` by `scale` block, keeping the anchor point fixed.
    ///
    /// # Panics
    ///
    /// Panics if `scale` is zero.
    pub fn scale(&mut self, scale: u32) -> &mut Self {
        assert_ne!(scale, 0, "text scale must be positive");
        self.scale = scale;
        self
    }

    /// Puts the top edge of the text at the anchor.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Puts the bottom edge of the text at the anchor.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Makes the text start at the anchor.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Makes the text end at the anchor.
    pub fn align_right(&mut self) -> &mut Self {
        self.alignment = Alignment::Right;
        self
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let font = MonoTextStyle::new(&FONT_10X20, self.color);
        let layout = TextStyleBuilder::new()
            .alignment(self.alignment)
            .baseline(self.baseline)
            .build();
        // Laid out around (0, 0), then moved to the anchor while scaling.
        let text = Text::with_text_style(self.text, Point::zero(), font, layout);
        let mut target = Scaled {
            canvas: &mut self.canvas,
            origin: self.anchor,
            scale: self.scale as i32,
        };
        infallible(text.draw(&mut target).map(drop));
    }
}

fn infallible(result: Result<(), Infallible>) {
    match result {
        Ok(()) => {}
        Err(never) => match never {},
    }
}

/// Draw target writing into an [`Image`]. Pixels outside of the image are skipped.
struct Canvas<'a>(&'a mut Image);

impl Dimensions for Canvas<'_> {
    fn bounding_box(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.0.width(), self.0.height()))
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        let (width, height) = (self.0.width(), self.0.height());
        for Pixel(Point { x, y }, color) in pixels {
            let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
                continue;
            };
            if x < width && y < height {
                self.0.set(x, y, color);
            }
        }
        Ok(())
    }
}

/// Maps point `p` to the `scale` by `scale` block at `origin + p * scale` of a [`Canvas`].
struct Scaled<'c, 'a> {
    canvas: &'c mut Canvas<'a>,
    origin: Point,
    scale: i32,
}

impl Dimensions for Scaled<'_, '_> {
    fn bounding_box(&self) -> Rectangle {
        let outer = self.canvas.bounding_box();
        let top_left = Point::new(
            (outer.top_left.x - self.origin.x).div_euclid(self.scale),
            (outer.top_left.y - self.origin.y).div_euclid(self.scale),
        );
        let scale = self.scale as u32;
        Rectangle::new(
            top_left,
            Size::new(outer.size.width / scale + 1, outer.size.height / scale + 1),
        )
    }
}

impl DrawTarget for Scaled<'_, '_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        let (origin, scale) = (self.origin, self.scale);
        let blocks = pixels.into_iter().flat_map(|Pixel(p, color)| {
            let corner = origin + p * scale;
            (0..scale)
                .cartesian_product(0..scale)
                .map(move |(dx, dy)| Pixel(corner + Point::new(dx, dy), color))
        });
        self.canvas.draw_iter(blocks)
    }
}
