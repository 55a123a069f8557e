use std::time::Duration;

/// A continuation waiting for its due time.
#[derive(Debug, Clone)]
struct Scheduled<T> {
    due: Duration,
    seq: u64,
    task: T,
}

/// Deferred tasks for a single-threaded event loop.
///
/// Nothing runs on its own: the owner polls [`Timers::pop_due`] with the
/// current time. Tasks due at the same instant come out in scheduling order.
#[derive(Debug, Clone)]
pub struct Timers<T> {
    entries: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timers<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn schedule(&mut self, due: Duration, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Scheduled { due, seq, task });
    }

    /// Remove and return the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<T> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(pos).task)
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.due).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keep only the tasks matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.entries.retain(|e| keep(&e.task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn nothing_is_due_early() {
        let mut timers = Timers::new();
        timers.schedule(ms(100), "a");
        assert_eq!(timers.pop_due(ms(99)), None);
        assert_eq!(timers.pop_due(ms(100)), Some("a"));
        assert!(timers.is_empty());
    }

    #[test]
    fn earliest_first_then_fifo() {
        let mut timers = Timers::new();
        timers.schedule(ms(300), "late");
        timers.schedule(ms(100), "first");
        timers.schedule(ms(100), "second");
        assert_eq!(timers.next_due(), Some(ms(100)));
        assert_eq!(timers.pop_due(ms(500)), Some("first"));
        assert_eq!(timers.pop_due(ms(500)), Some("second"));
        assert_eq!(timers.pop_due(ms(500)), Some("late"));
        assert_eq!(timers.pop_due(ms(500)), None);
    }

    #[test]
    fn retain_and_clear() {
        let mut timers = Timers::new();
        timers.schedule(ms(1), 1);
        timers.schedule(ms(2), 2);
        timers.schedule(ms(3), 3);
        timers.retain(|&t| t != 2);
        assert_eq!(timers.len(), 2);
        timers.clear();
        assert_eq!(timers.next_due(), None);
    }
}
