use fingercount::app::{self, WINDOW_TITLE};
use fingercount::config::Config;
use fingercount::gui;
use fingercount::hand::tracking::HandTracker;
use fingercount::timer::FpsCounter;
use fingercount::video::webcam::{Webcam, WebcamOptions};

#[fingercount::main]
fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    log::debug!("{:?}", config);

    let mut tracker = HandTracker::load(&config.model_dir, config.model)?;
    tracker.set_detection_threshold(config.min_detection_confidence);
    tracker.set_tracking_threshold(config.min_tracking_confidence);
    if let Some(alpha) = config.smoothing {
        tracker.set_smoothing(alpha);
    }

    let mut options = WebcamOptions::default()
        .resolution(config.resolution)
        .fps(config.fps);
    if let Some(name) = &config.webcam_name {
        options = options.name(name.clone());
    }
    let mut webcam = Webcam::open(options)?;

    let mut fps = FpsCounter::new("fingercount");
    loop {
        let mut image = webcam.read()?;
        if config.mirror {
            image.flip_horizontal_in_place();
        }

        let hand = tracker.track(&image)?;
        if let Some(state) = app::annotate(&mut image, hand.as_ref()) {
            log::trace!("fingers: {:?}", state.flags());
        }

        gui::show_image(WINDOW_TITLE, &image)?;

        if gui::poll_input()
            .into_iter()
            .any(|input| app::is_quit_request(input, config.quit_key))
        {
            log::debug!("quit requested");
            return Ok(());
        }

        fps.tick_with(webcam.timers().chain(tracker.timers()));
    }
}
