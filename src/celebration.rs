use crate::projector::DaySummary;
use std::time::{Duration, Instant};

pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// What the progress readout shows for the selected day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Percent(u8),
    Celebrating,
}

/// View-only deadline for the "all done" flourish. It never touches the
/// store; callers cancel it whenever the data behind the footer changes.
#[derive(Debug, Clone)]
pub struct Celebration {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Celebration {
    /// Delays longer than `MAX_DELAY` are capped.
    pub fn new(delay: Duration) -> Self {
        Celebration {
            delay: delay.min(MAX_DELAY),
            deadline: None,
        }
    }

    /// Starts the flourish if the summary is complete, otherwise disarms.
    pub fn arm(&mut self, summary: &DaySummary, now: Instant) {
        self.deadline = if summary.is_complete() {
            now.checked_add(self.delay)
        } else {
            None
        };
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Drops an expired deadline. Returns true if this call expired it.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now < deadline)
    }

    pub fn progress(&self, summary: &DaySummary, now: Instant) -> Progress {
        if summary.is_complete() && self.is_active(now) {
            Progress::Celebrating
        } else {
            Progress::Percent(summary.percent)
        }
    }
}

impl Default for Celebration {
    fn default() -> Self {
        Celebration::new(DEFAULT_DELAY)
    }
}

impl Progress {
    pub fn label(&self) -> String {
        match self {
            Progress::Percent(p) => format!("{}%", p),
            Progress::Celebrating => "All Done! 🎉".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total: usize, done: usize) -> DaySummary {
        let percent = if total == 0 {
            0
        } else {
            ((200 * done + total) / (2 * total)) as u8
        };
        DaySummary {
            total,
            done,
            active: total - done,
            percent,
        }
    }

    #[test]
    fn complete_day_celebrates_then_reverts() {
        let start = Instant::now();
        let all_done = summary(3, 3);
        let mut c = Celebration::default();
        c.arm(&all_done, start);

        assert_eq!(c.progress(&all_done, start), Progress::Celebrating);
        assert_eq!(
            c.progress(&all_done, start + Duration::from_millis(2999)),
            Progress::Celebrating
        );
        let later = start + DEFAULT_DELAY;
        assert!(c.tick(later));
        assert!(!c.tick(later));
        assert_eq!(c.progress(&all_done, later), Progress::Percent(100));
        assert_eq!(c.progress(&all_done, later).label(), "100%");
    }

    #[test]
    fn incomplete_or_empty_day_does_not_arm() {
        let now = Instant::now();
        let mut c = Celebration::default();
        c.arm(&summary(0, 0), now);
        assert!(!c.is_active(now));
        c.arm(&summary(4, 3), now);
        assert!(!c.is_active(now));
        assert_eq!(c.progress(&summary(4, 3), now).label(), "75%");
    }

    #[test]
    fn cancel_stops_pending_flourish() {
        let now = Instant::now();
        let mut c = Celebration::new(Duration::from_secs(10));
        c.arm(&summary(1, 1), now);
        assert!(c.is_active(now));
        c.cancel();
        assert!(!c.is_active(now));
        assert!(!c.tick(now + Duration::from_secs(11)));
    }

    #[test]
    fn stale_flourish_is_ignored_when_day_no_longer_complete() {
        let now = Instant::now();
        let mut c = Celebration::default();
        c.arm(&summary(2, 2), now);
        assert_eq!(c.progress(&summary(2, 1), now), Progress::Percent(50));
    }

    #[test]
    fn oversized_delay_is_capped() {
        let now = Instant::now();
        let mut c = Celebration::new(Duration::MAX);
        c.arm(&summary(1, 1), now);
        assert!(c.is_active(now));
        assert!(c.is_active(now + MAX_DELAY - Duration::from_secs(1)));
        assert!(c.tick(now + MAX_DELAY));
    }

    #[test]
    fn celebrating_label() {
        assert_eq!(Progress::Celebrating.label(), "All Done! 🎉");
    }
}
