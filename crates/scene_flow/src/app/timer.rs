use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug)]
struct PendingTimer<E> {
    handle: TimerHandle,
    remaining: Duration,
    event: E,
}

/// One-shot deferred events owned by a scene.
///
/// Events fire from `advance`, ordered by due time and then by scheduling
/// order. Anything still pending when the owner tears down is dropped by
/// `cancel_all` and can never fire afterwards.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_handle: u64,
    pending: Vec<PendingTimer<E>>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.pending.push(PendingTimer {
            handle,
            remaining: delay,
            event,
        });
        handle
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|timer| timer.handle != handle);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|timer| timer.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn advance(&mut self, dt: Duration) -> Vec<E> {
        for timer in &mut self.pending {
            timer.remaining = timer.remaining.saturating_sub(dt);
        }

        let mut due = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].remaining.is_zero() {
                due.push(self.pending.remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|timer| timer.handle.0);
        due.into_iter().map(|timer| timer.event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_delay_elapses() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_millis(100), "done");

        assert!(timers.advance(Duration::from_millis(60)).is_empty());
        assert_eq!(timers.advance(Duration::from_millis(40)), vec!["done"]);
        assert!(timers.advance(Duration::from_millis(100)).is_empty());
        assert!(timers.is_empty());
    }

    #[test]
    fn simultaneous_timers_fire_in_schedule_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::from_millis(50), 1);
        timers.schedule(Duration::from_millis(10), 2);
        timers.schedule(Duration::from_millis(30), 3);

        assert_eq!(timers.advance(Duration::from_millis(50)), vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerQueue::new();
        let handle = timers.schedule(Duration::from_millis(10), "stale");
        let kept = timers.schedule(Duration::from_millis(10), "kept");

        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        assert!(timers.is_pending(kept));
        assert_eq!(timers.advance(Duration::from_millis(10)), vec!["kept"]);
    }

    #[test]
    fn cancel_all_drops_everything() {
        let mut timers = TimerQueue::new();
        timers.schedule(Duration::ZERO, 'a');
        timers.schedule(Duration::from_secs(1), 'b');
        timers.cancel_all();
        assert!(timers.advance(Duration::from_secs(5)).is_empty());
    }
}
