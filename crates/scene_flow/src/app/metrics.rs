use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub tps: f32,
    pub ticks: u32,
    pub scene_switches: u32,
}

/// Counts ticks and scene switches over simulated time and yields a
/// snapshot once per interval.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    elapsed: Duration,
    ticks: u32,
    scene_switches: u32,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            ticks: 0,
            scene_switches: 0,
        }
    }

    pub(crate) fn record_tick(&mut self, dt: Duration) {
        self.ticks = self.ticks.saturating_add(1);
        self.elapsed = self.elapsed.saturating_add(dt);
    }

    pub(crate) fn record_scene_switch(&mut self) {
        self.scene_switches = self.scene_switches.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self) -> Option<LoopMetricsSnapshot> {
        if self.elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = self.elapsed.as_secs_f32().max(f32::EPSILON);
        let snapshot = LoopMetricsSnapshot {
            tps: self.ticks as f32 / elapsed_seconds,
            ticks: self.ticks,
            scene_switches: self.scene_switches,
        };

        self.elapsed = Duration::ZERO;
        self.ticks = 0;
        self.scene_switches = 0;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_expected_values() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        for _ in 0..4 {
            accumulator.record_tick(Duration::from_millis(250));
        }
        accumulator.record_scene_switch();

        let snapshot = accumulator
            .maybe_snapshot()
            .expect("snapshot should be emitted");

        assert!((snapshot.tps - 4.0).abs() < 0.05);
        assert_eq!(snapshot.ticks, 4);
        assert_eq!(snapshot.scene_switches, 1);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1));
        accumulator.record_tick(Duration::from_millis(500));

        assert!(accumulator.maybe_snapshot().is_none());
    }

    #[test]
    fn snapshot_resets_counters() {
        let mut accumulator = MetricsAccumulator::new(Duration::from_millis(100));
        accumulator.record_tick(Duration::from_millis(100));
        accumulator.record_scene_switch();
        accumulator.maybe_snapshot().expect("first");

        accumulator.record_tick(Duration::from_millis(100));
        let second = accumulator.maybe_snapshot().expect("second");
        assert_eq!(second.ticks, 1);
        assert_eq!(second.scene_switches, 0);
    }
}
