use rdev::{listen, Event, EventType, Key};
use std::thread;

/// Key that requests a stop from anywhere on the desktop.
pub const STOP_KEY: Key = Key::Escape;

fn is_stop_press(event: &Event) -> bool { matches!(event.event_type, EventType::KeyPress(ref key) if *key == STOP_KEY) }

/// Listens for [`STOP_KEY`] on a background thread and calls `on_stop` for every press.
pub fn spawn_stop_listener<F>(on_stop: F)
where
    F: Fn() + Send + 'static,
{
    thread::spawn(move || {
        let result = listen(move |event| {
            if is_stop_press(&event) {
                on_stop();
            }
        });
        if let Err(e) = result {
            tracing::warn!(error = ?e, "global stop hotkey unavailable");
        }
    });
}
