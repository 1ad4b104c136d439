use std::f32::consts::TAU;

use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let data = data
        .into_iter()
        .flat_map(|row| row.into_iter())
        .flat_map(|col| col.0)
        .collect::<Vec<_>>();
    Image::from_rgba8(Resolution::new(W as u32, H as u32), &data)
}

fn pixels_of(image: &Image, color: Color) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    for y in 0..image.height() {
        for x in 0..image.width() {
            if image.get(x, y) == color {
                out.push((x, y));
            }
        }
    }
    out
}

fn corners(view: &ImageView<'_>) -> [Color; 4] {
    [view.get(0, 0), view.get(1, 0), view.get(0, 1), view.get(1, 1)]
}

#[test]
fn nested_views() {
    let mut image = Image::new(4, 4);
    image.clear(C::WHITE);
    image.set(2, 1, C::RED);
    image.set(3, 3, C::BLUE);

    let inner = image.view(Rect::from_top_left(1.0, 1.0, 3.0, 3.0));
    assert_eq!(inner.resolution(), Resolution::new(3, 3));
    assert_eq!(inner.rect(), Rect::from_top_left(0.0, 0.0, 3.0, 3.0));
    assert_eq!(inner.get(1, 0), C::RED);
    assert_eq!(inner.get(2, 2), C::BLUE);

    let corner = inner.view(Rect::from_top_left(2.0, 2.0, 2.0, 2.0));
    assert_eq!(
        corner.image_area(),
        Rect::from_top_left(3.0, 3.0, 2.0, 2.0).into()
    );
    assert_eq!(corners(&corner), [C::BLUE, C::NULL, C::NULL, C::NULL]);

    // Child views may extend above their parent.
    let raised = inner.view(Rect::from_top_left(0.0, -1.0, 2.0, 2.0));
    assert_eq!(
        raised.image_area(),
        Rect::from_top_left(1.0, 0.0, 2.0, 2.0).into()
    );
    assert_eq!(corners(&raised), [C::WHITE, C::WHITE, C::WHITE, C::RED]);
}

#[test]
fn rotated_views() {
    let image = mkimage([[C::RED, C::GREEN], [C::BLUE, C::BLACK]]);
    let square = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);

    for (radians, expected) in [
        (0.0, [C::RED, C::GREEN, C::BLUE, C::BLACK]),
        (TAU / 4.0, [C::GREEN, C::BLACK, C::RED, C::BLUE]),
        (TAU / 2.0, [C::BLACK, C::BLUE, C::GREEN, C::RED]),
        (TAU * 0.75, [C::BLUE, C::RED, C::BLACK, C::GREEN]),
    ] {
        let view = image.view(RotatedRect::new(square, radians));
        assert_eq!(corners(&view), expected, "rotated by {radians}");
    }

    let quarter = image.view(RotatedRect::new(square, TAU / 4.0));
    let half = quarter.view(RotatedRect::new(square, TAU / 4.0));
    assert_eq!(corners(&half), [C::BLACK, C::BLUE, C::GREEN, C::RED]);

    // Offsets are along the rotated axes of the parent.
    let shifted = quarter.view(Rect::from_top_left(1.0, 0.0, 2.0, 2.0));
    assert_eq!(corners(&shifted), [C::BLACK, C::NULL, C::BLUE, C::NULL]);
}

#[test]
fn view_outside_of_image() {
    let image = mkimage([[C::RED], [C::GREEN], [C::BLUE]]);

    let middle = image.view(Rect::from_top_left(0.0, 1.0, 1.0, 1.0));
    assert_eq!(middle.resolution(), Resolution::new(1, 1));
    assert_eq!(middle.get(0, 0), C::GREEN);

    let overhang = image.view(Rect::bounding([[0.0, 2.0], [50.0, 40.0]]).unwrap());
    assert_eq!(overhang.rect().width(), 50.0);
    assert_eq!(overhang.rect().height(), 38.0);
    assert_eq!(corners(&overhang), [C::BLUE, C::NULL, C::NULL, C::NULL]);
}

#[test]
fn view_to_image() {
    let image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    let copy = image
        .view(Rect::from_top_left(1.0, 0.0, 3.0, 1.0))
        .to_image();
    assert_eq!(copy.resolution(), Resolution::new(3, 1));
    assert_eq!(copy.get(0, 0), C::GREEN);
    assert_eq!(copy.get(1, 0), C::BLUE);
    assert_eq!(copy.get(2, 0), C::NULL);
}

#[test]
fn flip_and_clear() {
    let mut image = mkimage([[C::RED, C::GREEN, C::BLUE]]);
    image.flip_horizontal_in_place();
    assert_eq!(image.get(0, 0), C::BLUE);
    assert_eq!(image.get(2, 0), C::RED);

    image.clear(C::BLACK);
    assert!(image.data().chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn decode_invalid_jpeg() {
    assert!(Image::decode_jpeg(&[0xff, 0xd8, 0x00]).is_err());
    assert!(Image::decode_jpeg(b"not a jpeg").is_err());
}

#[test]
fn draw_marker() {
    let mut image = Image::new(9, 9);
    draw::marker(&mut image, 4, 4).color(C::GREEN).size(3);

    let mut drawn = pixels_of(&image, C::GREEN);
    drawn.sort();
    assert_eq!(
        drawn,
        [(3, 3), (3, 5), (4, 4), (5, 3), (5, 5)],
    );
}

#[test]
fn draw_marker_clips_at_border() {
    let mut image = Image::new(4, 4);
    draw::marker(&mut image, 0, 0);
    assert_eq!(image.get(0, 0), C::RED);
    assert_eq!(image.get(1, 1), C::RED);
}

#[test]
fn draw_line() {
    let mut image = Image::new(5, 3);
    draw::line(&mut image, 0, 1, 4, 1).color(C::WHITE);
    assert_eq!(pixels_of(&image, C::WHITE).len(), 5);
    assert!((0..5).all(|x| image.get(x, 1) == C::WHITE));
}

#[test]
fn draw_rotated_rect_outline() {
    let mut image = Image::new(10, 10);
    draw::rotated_rect(&mut image, Rect::from_top_left(2.0, 2.0, 4.0, 4.0).into());
    assert_eq!(image.get(2, 2), C::RED);
    assert_eq!(image.get(6, 6), C::RED);
    assert_eq!(image.get(4, 4), C::NULL);
}

#[test]
fn draw_scaled_text() {
    let (x, y) = (5, 50);

    let mut small = Image::new(200, 60);
    draw::text(&mut small, x, y, "1 Finger")
        .align_left()
        .align_bottom();
    let mut large = Image::new(200, 60);
    draw::text(&mut large, x, y, "1 Finger")
        .align_left()
        .align_bottom()
        .scale(2)
        .color(C::GREEN);

    let small = pixels_of(&small, C::RED);
    let large = pixels_of(&large, C::GREEN);
    assert!(!small.is_empty());
    assert_eq!(large.len(), small.len() * 4);

    for (px, py) in large {
        assert!(px >= x as u32, "pixel ({px},{py}) left of the anchor");
        assert!(py <= y as u32 + 2, "pixel ({px},{py}) below the anchor");
        assert!(py >= y as u32 - 44, "pixel ({px},{py}) too far above the anchor");
    }
}

#[test]
fn draw_text_hanging_left_of_anchor() {
    let (x, y) = (150, 10);
    let mut image = Image::new(200, 60);
    draw::text(&mut image, x, y, "3 Fingers")
        .align_right()
        .align_top();

    let pixels = pixels_of(&image, C::RED);
    assert!(!pixels.is_empty());
    for (px, py) in pixels {
        assert!(px <= x as u32 + 1, "pixel ({px},{py}) right of the anchor");
        assert!(py >= y as u32 && py < y as u32 + 20, "pixel ({px},{py}) outside the line");
    }
}
