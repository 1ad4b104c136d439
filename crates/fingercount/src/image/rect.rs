//! Axis-aligned and rotated rectangles in image coordinates (X right, Y down).

use std::fmt;

use nalgebra::{Point2, Rotation2};

use super::AspectRatio;

/// An axis-aligned rectangle with float coordinates.
///
/// Width and height may be zero, but never negative.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    left: f32,
    top: f32,
    width: f32,
    height: f32,
}

impl Rect {
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self::from_top_left(x_center - width / 2.0, y_center - height / 2.0, width, height)
    }

    pub fn from_top_left(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn from_corners([left, top]: [f32; 2], [right, bottom]: [f32; 2]) -> Self {
        assert!(
            left <= right && top <= bottom,
            "({left},{top}) is not the top left of ({right},{bottom})"
        );
        Self::from_top_left(left, top, right - left, bottom - top)
    }

    /// The smallest rectangle containing all `points`, or [`None`] if there are none.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(points: I) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |([x0, y0], [x1, y1]), [x, y]| {
            ([x0.min(x), y0.min(y)], [x1.max(x), y1.max(y)])
        });
        Some(Self::from_corners(min, max))
    }

    /// Multiplies width and height by `factor`, keeping the center in place.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        let [cx, cy] = self.center();
        Self::from_center(cx, cy, self.width * factor, self.height * factor)
    }

    /// Adds a margin of `amount` times the width (or height) on each side.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
    }

    /// Extends the shorter side (relative to `aspect`) until the rectangle has that aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        let [cx, cy] = self.center();
        let ratio = aspect.as_f32();
        if self.height * ratio >= self.width {
            Self::from_center(cx, cy, self.height * ratio, self.height)
        } else {
            Self::from_center(cx, cy, self.width, self.width / ratio)
        }
    }

    #[must_use]
    pub fn move_by(&self, dx: f32, dy: f32) -> Self {
        Self::from_top_left(self.left + dx, self.top + dy, self.width, self.height)
    }

    /// Left edge.
    pub fn x(&self) -> f32 {
        self.left
    }

    /// Top edge.
    pub fn y(&self) -> f32 {
        self.top
    }

    pub fn x_center(&self) -> f32 {
        self.left + self.width / 2.0
    }

    pub fn y_center(&self) -> f32 {
        self.top + self.height / 2.0
    }

    pub fn center(&self) -> [f32; 2] {
        [self.x_center(), self.y_center()]
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    fn right(&self) -> f32 {
        self.left + self.width
    }

    fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// The overlapping part of `self` and `other`, if they touch.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let top_left = [self.left.max(other.left), self.top.max(other.top)];
        let bottom_right = [
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        ];
        let touching = top_left[0] <= bottom_right[0] && top_left[1] <= bottom_right[1];
        touching.then(|| Self::from_corners(top_left, bottom_right))
    }

    /// Intersection over union, 0.0 for disjoint rectangles and 1.0 for identical ones.
    pub fn iou(&self, other: &Self) -> f32 {
        let shared = self.intersection(other).map_or(0.0, |rect| rect.area());
        shared / (self.area() + other.area() - shared)
    }

    /// Whether `point` lies inside or on the edge of the rectangle.
    pub fn contains_point(&self, [x, y]: [f32; 2]) -> bool {
        (self.left..=self.right()).contains(&x) && (self.top..=self.bottom()).contains(&y)
    }

    /// Corners in clockwise order, starting at the top left.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let (l, t, r, b) = (self.left, self.top, self.right(), self.bottom());
        [[l, t], [r, t], [r, b], [l, b]]
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect {}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Rotates `point` clockwise (on screen) by `radians` around `pivot`.
fn rotate_around(point: [f32; 2], pivot: [f32; 2], radians: f32) -> [f32; 2] {
    let pivot = Point2::from(pivot);
    let p = pivot + Rotation2::new(radians) * (Point2::from(point) - pivot);
    [p.x, p.y]
}

/// A [`Rect`] turned clockwise around its center.
///
/// Points inside a rotated rectangle are addressed in its own frame, whose origin is the top left
/// corner of the unrotated [`Rect`] and whose axes turn with the rectangle. [`transform_out`] and
/// [`transform_in`] convert between that frame and the surrounding one.
///
/// [`transform_out`]: RotatedRect::transform_out
/// [`transform_in`]: RotatedRect::transform_in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// The smallest rectangle turned by `radians` that contains all `points`.
    ///
    /// Returns [`None`] if there are no points.
    pub fn bounding<I: IntoIterator<Item = [f32; 2]>>(radians: f32, points: I) -> Option<Self> {
        // Fit an axis-aligned box in a frame turned back by `radians`, then turn its center into
        // the outer frame again.
        let upright = Rect::bounding(
            points
                .into_iter()
                .map(|p| rotate_around(p, [0.0, 0.0], -radians)),
        )?;
        let [cx, cy] = rotate_around(upright.center(), [0.0, 0.0], radians);
        Some(Self::new(
            Rect::from_center(cx, cy, upright.width(), upright.height()),
            radians,
        ))
    }

    /// Clockwise rotation, in radians.
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// The rectangle before rotation.
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn center(&self) -> [f32; 2] {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        Self::new(self.rect.grow_rel(amount), self.radians)
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, aspect: AspectRatio) -> Self {
        Self::new(self.rect.grow_to_fit_aspect(aspect), self.radians)
    }

    /// The corners of the rectangle in the outer frame, in the order of [`Rect::corners`].
    pub fn rotated_corners(&self) -> [[f32; 2]; 4] {
        let center = self.center();
        self.rect
            .corners()
            .map(|corner| rotate_around(corner, center, self.radians))
    }

    pub fn contains_point(&self, point: [f32; 2]) -> bool {
        let [x, y] = self.transform_in(point);
        Rect::from_top_left(0.0, 0.0, self.rect.width(), self.rect.height()).contains_point([x, y])
    }

    /// Converts `point` from the outer frame into the rectangle's own frame.
    pub fn transform_in(&self, point: [f32; 2]) -> [f32; 2] {
        let [x, y] = rotate_around(point, self.center(), -self.radians);
        [x - self.rect.x(), y - self.rect.y()]
    }

    /// Converts `point` from the rectangle's own frame into the outer frame.
    pub fn transform_out(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        rotate_around(
            [x + self.rect.x(), y + self.rect.y()],
            self.center(),
            self.radians,
        )
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_abs_diff_eq;

    use super::*;

    #[track_caller]
    fn assert_near(actual: [f32; 2], expected: [f32; 2]) {
        assert_abs_diff_eq!(actual[0], expected[0], epsilon = 1e-4);
        assert_abs_diff_eq!(actual[1], expected[1], epsilon = 1e-4);
    }

    #[test]
    fn center_and_edges() {
        let rect = Rect::from_center(10.0, 20.0, 4.0, 8.0);
        assert_eq!((rect.x(), rect.y()), (8.0, 16.0));
        assert_eq!(rect.center(), [10.0, 20.0]);
        assert_eq!(rect, Rect::from_top_left(8.0, 16.0, 4.0, 8.0));
        assert_eq!(rect.move_by(1.0, -1.0).center(), [11.0, 19.0]);
    }

    #[test]
    fn point_containment_includes_edges() {
        let rect = Rect::from_top_left(-5.0, 5.0, 10.0, 5.0);
        assert!(rect.contains_point([-5.0, 5.0]));
        assert!(rect.contains_point([5.0, 10.0]));
        assert!(!rect.contains_point([6.0, 9.0]));
        assert!(!rect.contains_point([4.0, 11.0]));
    }

    #[test]
    fn intersection_and_iou() {
        let big = Rect::from_center(9.0, 9.0, 2.0, 2.0);
        let small = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        assert_eq!(big.intersection(&small), Some(small));
        assert_eq!(small.iou(&big), 0.25);
        assert_eq!(big.iou(&small), 0.25);
        assert_eq!(big.iou(&big), 1.0);

        let far = big.move_by(100.0, 0.0);
        assert_eq!(big.intersection(&far), None);
        assert_eq!(big.iou(&far), 0.0);

        // Touching edges intersect in an empty rectangle.
        let touching = Rect::from_top_left(10.0, 8.0, 2.0, 2.0);
        assert_eq!(big.intersection(&touching).map(|r| r.area()), Some(0.0));
    }

    #[test]
    fn bounding_box() {
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]).unwrap(),
            Rect::from_center(0.0, 0.0, 2.0, 2.0),
        );
        assert_eq!(
            Rect::bounding([[1.0, 1.0], [2.0, 2.0]]).unwrap(),
            Rect::from_center(1.5, 1.5, 1.0, 1.0),
        );
        assert_eq!(Rect::bounding([]), None);
    }

    #[test]
    fn scaling_keeps_center() {
        let rect = Rect::from_center(10.0, 10.0, 10.0, 20.0);
        assert_eq!(rect.grow_rel(0.5), Rect::from_center(10.0, 10.0, 20.0, 40.0));
        assert_near(rect.scale(2.6).center(), [10.0, 10.0]);
        assert_abs_diff_eq!(rect.scale(2.6).width(), 26.0, epsilon = 1e-4);
        assert_abs_diff_eq!(rect.scale(2.6).height(), 52.0, epsilon = 1e-4);
    }

    #[test]
    fn fit_aspect() {
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(AspectRatio::SQUARE),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn transforms() {
        let unit = Rect::from_top_left(0.0, 0.0, 1.0, 1.0);

        let upright = RotatedRect::from(unit.move_by(10.0, 20.0));
        assert_near(upright.transform_in([10.0, 20.0]), [0.0, 0.0]);
        assert_near(upright.transform_out([1.0, -1.0]), [11.0, 19.0]);

        // A quarter turn clockwise moves the top left corner to the top right.
        let quarter = RotatedRect::new(unit, FRAC_PI_2);
        assert_near(quarter.transform_out([0.0, 0.0]), [1.0, 0.0]);
        assert_near(quarter.transform_out([0.0, -1.0]), [2.0, 0.0]);
        assert_near(quarter.transform_in([0.0, 0.0]), [0.0, 1.0]);
        assert_near(quarter.transform_in([0.5, 0.5]), [0.5, 0.5]);

        let half = RotatedRect::new(unit.move_by(10.0, 20.0), PI);
        assert_near(half.transform_out([0.0, 0.0]), [11.0, 21.0]);
        assert_near(half.transform_in([10.0, 20.0]), [1.0, 1.0]);

        let odd = RotatedRect::new(Rect::from_center(40.0, -3.0, 17.0, 9.0), 0.7);
        assert_near(odd.transform_out(odd.transform_in([12.5, 4.0])), [12.5, 4.0]);
    }

    #[test]
    fn rotated_containment() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 51.0, 1.0), FRAC_PI_2);
        assert!(rect.contains_point([0.0, 0.0]));
        assert!(rect.contains_point([0.0, 25.0]));
        assert!(rect.contains_point([0.0, -25.0]));
        assert!(!rect.contains_point([0.0, 26.0]));
        assert!(!rect.contains_point([1.0, 0.0]));
    }

    #[test]
    fn rotated_bounding_box() {
        assert!(RotatedRect::bounding(0.0, []).is_none());

        let rect = RotatedRect::bounding(FRAC_PI_2, [[0.0, 0.0], [9.0, 9.0]]).unwrap();
        assert_near(rect.center(), [4.5, 4.5]);
        assert_abs_diff_eq!(rect.rect().width(), 9.0, epsilon = 1e-4);
        assert_abs_diff_eq!(rect.rect().height(), 9.0, epsilon = 1e-4);

        let points = [[3.0, 1.0], [-2.0, 5.0], [0.0, 0.0], [4.0, 4.0]];
        let rect = RotatedRect::bounding(0.4, points).unwrap().grow_rel(0.001);
        for p in points {
            assert!(rect.contains_point(p), "{rect:?} does not contain {p:?}");
        }
    }

    #[test]
    fn corners() {
        let rect = Rect::from_center(1.0, 1.0, 4.0, 2.0);
        assert_eq!(
            rect.corners(),
            [[-1.0, 0.0], [3.0, 0.0], [3.0, 2.0], [-1.0, 2.0]]
        );

        let turned = RotatedRect::new(rect, PI).rotated_corners();
        assert_near(turned[0], [3.0, 2.0]);
        assert_near(turned[2], [-1.0, 0.0]);
    }
}
