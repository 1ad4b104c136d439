//! A minimal window system for displaying frames and reading key presses.
//!
//! The window event loop has to run on the main thread, so [`run`] takes over the main thread and
//! runs the application on a separate one. The application talks to the event loop through
//! [`show_image`] and [`poll_input`].

mod renderer;

use std::{
    collections::{hash_map::Entry, HashMap, VecDeque},
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    rc::Rc,
    sync::{Mutex, OnceLock, PoisonError},
};

use anyhow::{anyhow, Context};
use winit::{
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget},
    window::WindowId,
};

use crate::{
    image::{Image, Resolution},
    termination::Termination,
};

use self::renderer::{Gpu, Renderer};

/// An input event received by one of the GUI windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    /// A character was typed.
    Char(char),
    /// The Escape key was pressed.
    Escape,
    /// The user asked to close a window.
    CloseRequested,
}

#[derive(Debug)]
enum Msg {
    Image {
        title: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

static PROXY: OnceLock<Mutex<EventLoopProxy<Msg>>> = OnceLock::new();

static INPUT: Mutex<VecDeque<UserInput>> = Mutex::new(VecDeque::new());

struct Gui {
    gpu: Rc<Gpu>,
    windows: HashMap<String, Renderer>,
    win_id_to_title: HashMap<WindowId, String>,
}

impl Gui {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            gpu: Rc::new(pollster::block_on(Gpu::open())?),
            windows: HashMap::new(),
            win_id_to_title: HashMap::new(),
        })
    }

    fn renderer_mut(&mut self, win: WindowId) -> Option<&mut Renderer> {
        let title = self.win_id_to_title.get(&win)?;
        self.windows.get_mut(title)
    }

    fn show(
        &mut self,
        target: &EventLoopWindowTarget<Msg>,
        title: String,
        res: Resolution,
        data: &[u8],
    ) -> anyhow::Result<()> {
        let renderer = match self.windows.entry(title) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                log::debug!("creating window '{}' at {}", entry.key(), res);
                let renderer = Renderer::open(target, entry.key(), res, self.gpu.clone())?;
                self.win_id_to_title
                    .insert(renderer.window().id(), entry.key().clone());
                entry.insert(renderer)
            }
        };

        renderer.update_texture(res, data);
        renderer.window().request_redraw();
        Ok(())
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { title, res, data }) => {
                    if let Err(e) = self.show(target, title, res, &data) {
                        log::error!("failed to display image: {:?}", e);
                        process::exit(1);
                    }
                }
                Event::RedrawRequested(window) => {
                    if let Some(renderer) = self.renderer_mut(window) {
                        if let Err(e) = renderer.redraw() {
                            log::error!("failed to redraw window: {:?}", e);
                        }
                    }
                }
                Event::WindowEvent { event, .. } => {
                    if let Some(input) = user_input(&event) {
                        INPUT
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push_back(input);
                    }
                }
                _ => {}
            }
        })
    }
}

fn user_input(event: &WindowEvent<'_>) -> Option<UserInput> {
    match event {
        WindowEvent::CloseRequested => Some(UserInput::CloseRequested),
        WindowEvent::ReceivedCharacter(c) if !c.is_control() => Some(UserInput::Char(*c)),
        WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(VirtualKeyCode::Escape),
                    ..
                },
            ..
        } => Some(UserInput::Escape),
        _ => None,
    }
}

pub(crate) fn run<F, R>(cb: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    if PROXY.set(Mutex::new(event_loop.create_proxy())).is_err() {
        panic!("GUI already initialized");
    }

    let gui = match Gui::new() {
        Ok(gui) => gui,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            process::exit(1);
        }
    };

    // The GUI is ready; run the application on another thread.
    std::thread::spawn(move || match catch_unwind(AssertUnwindSafe(cb)) {
        Ok(r) => {
            if r.is_success() {
                process::exit(0);
            } else {
                // Prints the error, if any.
                r.report();
                process::exit(1);
            }
        }
        // The panic hook has already printed the message, exit like libstd does.
        Err(_payload) => process::exit(101),
    });

    gui.run(event_loop);
}

/// Displays an image in the window titled `title`.
///
/// The window is created on first use, sized to fit `image`.
///
/// Returns an error if the GUI is not running.
pub fn show_image(title: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    let proxy = PROXY
        .get()
        .context("GUI is not running (use `#[fingercount::main]`)")?;

    proxy
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .send_event(Msg::Image {
            title: title.into(),
            res: image.resolution(),
            data: image.data().to_vec(),
        })
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Returns all user input received since the last call.
pub fn poll_input() -> Vec<UserInput> {
    INPUT
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain(..)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_image_without_gui() {
        let err = show_image("Frame", &Image::new(2, 2)).unwrap_err();
        assert!(err.to_string().contains("not running"), "{err}");
    }

    #[test]
    fn input_from_window_events() {
        assert_eq!(
            user_input(&WindowEvent::ReceivedCharacter('q')),
            Some(UserInput::Char('q'))
        );
        assert_eq!(user_input(&WindowEvent::ReceivedCharacter('\u{1b}')), None);
        assert_eq!(
            user_input(&WindowEvent::CloseRequested),
            Some(UserInput::CloseRequested)
        );
        assert_eq!(user_input(&WindowEvent::Focused(true)), None);
    }
}
