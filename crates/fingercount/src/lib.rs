//! Finger counting on a live webcam feed.
//!
//! The pipeline is: capture a frame from a [`Webcam`], locate a hand with
//! [`HandTracker`], classify each finger with the [`FingerState`] heuristic, draw the result and
//! show it in a window.
//!
//! # Coordinates
//!
//! All 2D coordinates are image pixel coordinates: X points to the right, Y points *down*.
//! Rotations are clockwise (as seen on screen) and given in radians.
//!
//! # Environment Variables
//!
//! The binary is configured through environment variables, see [`config::Config`]. Logging can
//! be adjusted with `RUST_LOG`.
//!
//! [`Webcam`]: video::webcam::Webcam
//! [`HandTracker`]: hand::tracking::HandTracker
//! [`FingerState`]: hand::fingers::FingerState

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod detection;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod termination;
pub mod timer;
pub mod video;

pub use fingercount_macros::main;

#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let level = match cfg!(debug_assertions) {
        true => LevelFilter::Trace,
        false => LevelFilter::Debug,
    };
    let result = env_logger::Builder::new()
        .filter(Some(calling_crate), level)
        .filter(Some(env!("CARGO_CRATE_NAME")), level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init();
    // A logger installed earlier wins.
    drop(result);
}

/// Used by `#[fingercount::main]`.
#[doc(hidden)]
pub fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: termination::Termination + Send,
{
    gui::run(cb)
}

/// Sets up `env_logger` output on stderr.
///
/// The calling crate and this library log at *trace* level in debug builds and at *debug* level
/// in release builds. `wgpu` is limited to *warn*. `RUST_LOG` overrides all of these.
///
/// Does nothing if a logger is already installed.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
