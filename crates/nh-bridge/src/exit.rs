//! Engine exit trampoline.
//!
//! The engine ends a game by calling its process-exit routine, usually from
//! deep inside the death path after it has already freed its dynamic data.
//! The bridge routes that call to [`engine_exit`], which unwinds with an
//! [`EngineExited`] payload. [`run_guarded`] is the landing pad around every
//! engine entry point; it turns the unwind (or a genuine engine panic) into
//! an [`ExitReason`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Unwind payload carrying the engine's exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineExited {
    pub status: i32,
}

/// How an engine entry point ended instead of returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The engine called its exit routine.
    Exited(i32),
    /// Any other panic inside engine code.
    Panicked(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Exited(status) => write!(f, "exit status {status}"),
            ExitReason::Panicked(msg) => write!(f, "panic: {msg}"),
        }
    }
}

impl ExitReason {
    pub fn is_clean(&self) -> bool {
        matches!(self, ExitReason::Exited(0))
    }
}

/// Leave the engine without returning to the caller.
pub fn engine_exit(status: i32) -> ! {
    log::debug!("engine exit requested with status {}", status);
    panic::resume_unwind(Box::new(EngineExited { status }))
}

/// Run `f`, catching an engine exit or panic.
pub fn run_guarded<T>(f: impl FnOnce() -> T) -> Result<T, ExitReason> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(reason_from_payload)
}

fn reason_from_payload(payload: Box<dyn Any + Send>) -> ExitReason {
    if let Some(exited) = payload.downcast_ref::<EngineExited>() {
        return ExitReason::Exited(exited.status);
    }
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return ExitReason::Panicked((*msg).to_string());
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return ExitReason::Panicked(msg.clone());
    }
    ExitReason::Panicked("non-string panic payload".to_string())
}

/// Set when the engine has already released its dynamic data on the way
/// out, so shutdown must not release it again.
#[derive(Debug, Clone, Default)]
pub struct DynamicDataFreed(Arc<AtomicBool>);

impl DynamicDataFreed {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clear the marker and report whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_is_caught() {
        let result: Result<(), _> = run_guarded(|| engine_exit(3));
        assert_eq!(result, Err(ExitReason::Exited(3)));
    }

    #[test]
    fn test_panic_message_is_reported() {
        let result: Result<(), _> = run_guarded(|| panic!("bad fruit {}", 0));
        assert_eq!(result, Err(ExitReason::Panicked("bad fruit 0".into())));
    }

    #[test]
    fn test_normal_return_passes_through() {
        assert_eq!(run_guarded(|| 42), Ok(42));
        assert!(ExitReason::Exited(0).is_clean());
        assert!(!ExitReason::Exited(1).is_clean());
    }

    #[test]
    fn test_freed_marker_take_clears() {
        let marker = DynamicDataFreed::default();
        let other = marker.clone();
        assert!(!marker.take());
        other.mark();
        assert!(marker.is_set());
        assert!(marker.take());
        assert!(!other.is_set());
    }
}
