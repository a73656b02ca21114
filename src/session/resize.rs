use crate::frame::TermSize;
use std::time::Duration;
use tokio::time::Instant;

/// Coalesces bursts of local size changes into one flush per quiet window.
#[derive(Debug)]
pub(super) struct ResizeDebouncer {
    window: Duration,
    pending: Option<TermSize>,
    acknowledged: Option<TermSize>,
    deadline: Option<Instant>,
}

impl ResizeDebouncer {
    pub(super) fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            acknowledged: None,
            deadline: None,
        }
    }

    /// Record the newest size and restart the quiet window.
    pub(super) fn request(&mut self, size: TermSize, now: Instant) {
        self.pending = Some(size);
        self.deadline = Some(now + self.window);
    }

    pub(super) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(super) fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Newest positive size seen locally, whether or not it was flushed.
    pub(super) fn latest(&self) -> Option<TermSize> {
        self.pending.filter(TermSize::is_positive)
    }

    /// Record a size the remote side has been told about by other means.
    pub(super) fn acknowledge(&mut self, size: TermSize) {
        self.acknowledged = Some(size);
        if self.pending == Some(size) {
            self.pending = None;
        }
    }

    /// Size to send now that the window elapsed, if any. The pending size is
    /// kept when `deliverable` is false so a later flush can pick it up.
    pub(super) fn take_due(&mut self, deliverable: bool) -> Option<TermSize> {
        self.deadline = None;
        if !deliverable {
            return None;
        }
        let size = self.pending.take()?;
        if !size.is_positive() || self.acknowledged == Some(size) {
            return None;
        }
        self.acknowledged = Some(size);
        Some(size)
    }
}
