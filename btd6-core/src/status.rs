//! Single-line live status output that never interleaves with log lines.
//!
//! [`rewrite`] overwrites the current terminal line. A log formatter calls
//! [`take_pending`] before emitting a record and terminates the status line
//! first when one is open.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

static LINE_OPEN: AtomicBool = AtomicBool::new(false);

/// Replaces the current status line on stderr.
pub fn rewrite(line: &str) {
    let mut stderr = io::stderr().lock();
    // Best effort; a closed terminal is not worth failing a replay for.
    let _ = write!(stderr, "\r{line}\x1b[K");
    let _ = stderr.flush();
    LINE_OPEN.store(true, Ordering::Relaxed);
}

/// Whether a status line is open; closes it.
pub fn take_pending() -> bool {
    LINE_OPEN.swap(false, Ordering::Relaxed)
}

/// Terminates an open status line with a newline.
pub fn settle() {
    if take_pending() {
        let _ = writeln!(io::stderr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_leaves_a_line_open_until_taken() {
        rewrite("money 650 | round 1");
        assert!(take_pending());
        assert!(!take_pending());
        settle();
        assert!(!take_pending());
    }
}
