//! Per-frame application logic: counting fingers, drawing the result and handling user input.

use crate::gui::UserInput;
use crate::hand::fingers::{self, FingerState, LandmarkList};
use crate::hand::tracking::HandData;
use crate::image::{draw, Color, Image};

/// Title of the window showing the annotated camera feed.
pub const WINDOW_TITLE: &str = "Frame";

/// Bottom left corner of the finger count label, in frame pixels.
pub const LABEL_POSITION: (i32, i32) = (45, 375);

const LABEL_SCALE: u32 = 2;

/// Builds the pixel landmark list of the tracked hand. Empty if no hand was found.
pub fn landmark_list(hand: Option<&HandData>) -> LandmarkList {
    match hand {
        Some(hand) => LandmarkList::from_result(hand.landmarks()),
        None => LandmarkList::new(),
    }
}

/// Draws the hand skeleton and the finger count onto `image`.
///
/// Nothing is drawn if `hand` is [`None`]. Returns the classified fingers.
pub fn annotate(image: &mut Image, hand: Option<&HandData>) -> Option<FingerState> {
    let state = FingerState::classify(&landmark_list(hand))?;
    if let Some(hand) = hand {
        hand.landmarks().draw(image);
    }
    draw_count(image, state.count());
    Some(state)
}

/// Draws the finger count label at [`LABEL_POSITION`].
pub fn draw_count(image: &mut Image, count: usize) {
    let (x, y) = LABEL_POSITION;
    draw::text(image, x, y, &fingers::label(count))
        .align_left()
        .align_bottom()
        .scale(LABEL_SCALE)
        .color(Color::RED);
}

/// Returns whether `input` asks the application to exit.
pub fn is_quit_request(input: UserInput, quit_key: char) -> bool {
    match input {
        UserInput::Char(c) => c == quit_key,
        UserInput::Escape | UserInput::CloseRequested => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_requests() {
        assert!(is_quit_request(UserInput::Char('q'), 'q'));
        assert!(!is_quit_request(UserInput::Char('Q'), 'q'));
        assert!(!is_quit_request(UserInput::Char('w'), 'q'));
        assert!(is_quit_request(UserInput::Char('x'), 'x'));
        assert!(is_quit_request(UserInput::Escape, 'q'));
        assert!(is_quit_request(UserInput::CloseRequested, 'q'));
    }

    #[test]
    fn no_hand_no_annotation() {
        let mut image = Image::new(640, 480);
        assert_eq!(annotate(&mut image, None), None);
        assert!(image.data().iter().all(|&b| b == 0));
        assert!(landmark_list(None).is_empty());
    }

    #[test]
    fn count_label_is_drawn_above_position() {
        let mut image = Image::new(640, 480);
        draw_count(&mut image, 3);

        let (x, y) = LABEL_POSITION;
        let mut red = 0;
        for py in 0..image.height() {
            for px in 0..image.width() {
                if image.get(px, py) == Color::RED {
                    red += 1;
                    assert!(px as i32 >= x, "pixel left of label: {px},{py}");
                    assert!(py as i32 <= y + 2, "pixel below label: {px},{py}");
                }
            }
        }
        assert!(red > 0);
    }
}
