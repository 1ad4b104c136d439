//! Exit status of the application closure.

use std::{convert::Infallible, fmt::Debug, process};

/// A [`process::Termination`] value that can also tell whether it stands for success.
///
/// The main thread runs the window event loop and never returns from `main`. The application
/// closure runs on another thread, and the process exits with a status based on what it returned.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        self.as_ref().map_or(false, T::is_success)
    }
}
