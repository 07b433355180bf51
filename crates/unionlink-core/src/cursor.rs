//! Range cursor — the `[start, end)` block window under scan.

use serde::{Deserialize, Serialize};

/// A half-open block range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub fn new(start: u64, size: u64) -> Self {
        Self {
            start,
            end: start.saturating_add(size),
        }
    }

    /// Last block inside the window (the inclusive `toBlock` of a log query).
    pub fn last_block(&self) -> u64 {
        self.end.saturating_sub(1)
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, block: u64) -> bool {
        (self.start..self.end).contains(&block)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The scanner's position in the chain.
///
/// Windows are contiguous: after [`advance`](Self::advance) the new window
/// starts exactly where the previous one ended. `start` never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeCursor {
    window: Window,
    size: u64,
}

impl RangeCursor {
    /// Create a cursor whose first window starts at `start_block`.
    /// A zero `size` is treated as 1.
    pub fn new(start_block: u64, size: u64) -> Self {
        let size = size.max(1);
        Self {
            window: Window::new(start_block, size),
            size,
        }
    }

    /// The window currently under scan.
    pub fn window(&self) -> Window {
        self.window
    }

    /// The window that follows the current one.
    pub fn next_window(&self) -> Window {
        Window::new(self.window.end, self.size)
    }

    /// `start ← end`, `end ← end + size`. Returns the new window.
    pub fn advance(&mut self) -> Window {
        self.window = self.next_window();
        self.window
    }

    /// Jump forward to a persisted position. Never moves backwards, and
    /// ignores a position whose window would run past `u64::MAX`.
    pub fn resume_from(&mut self, next_block: u64) -> bool {
        if next_block <= self.window.start || next_block.checked_add(self.size).is_none() {
            return false;
        }
        self.window = Window::new(next_block, self.size);
        true
    }
}
