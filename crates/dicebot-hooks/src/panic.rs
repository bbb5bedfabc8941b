//! Panic payload rendering and backtrace capture.
//!
//! [`install_backtrace_capture`] chains a panic hook that records a
//! backtrace in a thread-local slot. `catch_unwind` returns on the thread
//! that panicked, so the catch site collects it with
//! [`take_panic_backtrace`] right after catching.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::sync::Once;

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Install the capturing panic hook. Idempotent; the previous hook still runs.
pub fn install_backtrace_capture() {
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let backtrace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            previous(info);
        }));
    });
}

/// Take the backtrace of the most recent panic on this thread, if the
/// capturing hook saw one.
#[must_use]
pub fn take_panic_backtrace() -> Option<String> {
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

/// Render a caught panic payload as text.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_str_and_string() {
        let caught = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom");

        let caught = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "formatted 1");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "unknown panic payload");
    }

    #[inline(never)]
    fn failing_frame() {
        panic!("deep");
    }

    #[test]
    fn test_backtrace_is_captured_once_per_panic() {
        install_backtrace_capture();
        install_backtrace_capture();
        let _ = take_panic_backtrace();

        std::panic::catch_unwind(failing_frame).unwrap_err();
        let backtrace = take_panic_backtrace().unwrap();
        assert!(!backtrace.is_empty());
        assert!(take_panic_backtrace().is_none());
    }
}
