use std::any::Any;
use std::panic::{AssertUnwindSafe, UnwindSafe, catch_unwind};

/// Run `f`, logging and swallowing any panic. Returns `None` if `f` panicked.
pub fn handle_unwind<T>(context: &str, f: impl FnOnce() -> T + UnwindSafe) -> Option<T> {
    match catch_unwind(f) {
        Ok(x) => Some(x),
        Err(e) => {
            log::error!("Caught panic in {context}: {}", panic_message(&*e));
            // Dropping the payload can itself panic.
            _ = catch_unwind(AssertUnwindSafe(move || drop(e)));
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
