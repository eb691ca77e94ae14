//! Mouse input injection.
//!
//! The executor only needs three operations from the desktop; everything else
//! about driving the cursor stays behind [`InputInjector`].

use enigo::{Enigo, MouseButton, MouseControllable};
use std::thread;

use crate::action::{Action, ActionKind};
use crate::error::{AutomatorError, Result};
use crate::human_mouse;

pub trait InputInjector: Send {
    fn click(&mut self, x: i32, y: i32) -> Result<()>;
    fn move_to(&mut self, x: i32, y: i32) -> Result<()>;
    fn current_position(&mut self) -> Result<(i32, i32)>;
}

impl<I: InputInjector + ?Sized> InputInjector for Box<I> {
    fn click(&mut self, x: i32, y: i32) -> Result<()> { (**self).click(x, y) }
    fn move_to(&mut self, x: i32, y: i32) -> Result<()> { (**self).move_to(x, y) }
    fn current_position(&mut self) -> Result<(i32, i32)> { (**self).current_position() }
}

/// Performs one action against the injector. Returns what was done, or `None` for a pure wait.
pub fn dispatch(injector: &mut dyn InputInjector, action: &Action) -> Result<Option<String>> {
    let (x, y) = action.position();
    match action.kind {
        ActionKind::Click => {
            injector.click(x, y)?;
            Ok(Some(format!("clicked at ({x}, {y})")))
        }
        ActionKind::Move => {
            injector.move_to(x, y)?;
            Ok(Some(format!("moved to ({x}, {y})")))
        }
        ActionKind::Wait => Ok(None),
    }
}

// -------------- enigo backend --------------
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MotionStyle {
    /// Jump straight to the target.
    #[default]
    Direct,
    /// Glide along a randomized curve before acting.
    Human,
}

/// Drives the real cursor.
///
/// A fresh `Enigo` handle is opened per call so the injector can move to the
/// playback worker thread. With the fail-safe on, any request made while the
/// cursor rests in a screen corner fails instead of acting.
#[derive(Clone, Copy, Debug)]
pub struct EnigoInjector {
    pub motion: MotionStyle,
    pub fail_safe: bool,
}

impl Default for EnigoInjector {
    fn default() -> Self { Self { motion: MotionStyle::Direct, fail_safe: true } }
}

impl EnigoInjector {
    pub fn new(motion: MotionStyle, fail_safe: bool) -> Self { Self { motion, fail_safe } }

    fn guard(&self, enigo: &Enigo) -> Result<()> {
        if !self.fail_safe {
            return Ok(());
        }
        let (w, h) = enigo.main_display_size();
        let pos = enigo.mouse_location();
        if in_corner(pos, (w as i32, h as i32)) {
            return Err(AutomatorError::InjectionFailure(format!(
                "fail-safe triggered: cursor is in a screen corner at ({}, {})",
                pos.0, pos.1
            )));
        }
        Ok(())
    }

    fn travel(&self, enigo: &mut Enigo, x: i32, y: i32) {
        match self.motion {
            MotionStyle::Direct => enigo.mouse_move_to(x, y),
            MotionStyle::Human => {
                let mut rng = rand::thread_rng();
                let from = enigo.mouse_location();
                for (px, py) in human_mouse::bezier_path(&mut rng, from, (x, y)) {
                    enigo.mouse_move_to(px, py);
                    thread::sleep(human_mouse::step_delay(&mut rng));
                }
            }
        }
    }
}

impl InputInjector for EnigoInjector {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        let mut enigo = Enigo::new();
        self.guard(&enigo)?;
        self.travel(&mut enigo, x, y);
        enigo.mouse_click(MouseButton::Left);
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        let mut enigo = Enigo::new();
        self.guard(&enigo)?;
        self.travel(&mut enigo, x, y);
        Ok(())
    }

    fn current_position(&mut self) -> Result<(i32, i32)> { Ok(Enigo::new().mouse_location()) }
}

/// True when `pos` sits on one of the four corner pixels of a `size` screen.
fn in_corner(pos: (i32, i32), size: (i32, i32)) -> bool {
    let (x, y) = pos;
    let (right, bottom) = (size.0 - 1, size.1 - 1);
    (x <= 0 || x >= right) && (y <= 0 || y >= bottom)
}
