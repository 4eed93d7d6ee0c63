//! Lap timing on the host, plus device time from event profiling.

use opencl3::event::Event;
use std::time::{Duration, Instant};

/// Measures consecutive laps; the first lap starts at construction.
#[derive(Debug)]
pub struct Stopwatch {
    last: Instant,
    laps: Laps,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
            laps: Laps::default(),
        }
    }

    /// Closes the current lap and starts the next one.
    pub fn next_lap(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now.duration_since(self.last);
        self.last = now;
        self.laps.push(lap.as_secs_f64());
        lap
    }

    pub fn laps(&self) -> &Laps {
        &self.laps
    }

    pub fn into_laps(self) -> Laps {
        self.laps
    }
}

/// Lap durations in seconds.
///
/// Statistics skip the fastest and slowest fifth (warm-up, stragglers),
/// i.e. they cover the 20th to 80th percentile. Up to four laps are used
/// unfiltered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Laps(Vec<f64>);

impl Laps {
    pub fn push(&mut self, secs: f64) {
        self.0.push(secs);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn filtered(&self) -> Vec<f64> {
        let mut laps = self.0.clone();
        laps.sort_by(f64::total_cmp);
        let n = laps.len();
        if n <= 4 {
            return laps;
        }
        let cut = n / 5;
        laps[cut..n - cut].to_vec()
    }

    /// Mean of the filtered laps, `0.0` without laps.
    pub fn avg(&self) -> f64 {
        let laps = self.filtered();
        if laps.is_empty() {
            return 0.0;
        }
        laps.iter().sum::<f64>() / laps.len() as f64
    }

    /// Population standard deviation of the filtered laps.
    pub fn std(&self) -> f64 {
        let laps = self.filtered();
        if laps.is_empty() {
            return 0.0;
        }
        let avg = laps.iter().sum::<f64>() / laps.len() as f64;
        let var = laps.iter().map(|x| (x - avg) * (x - avg)).sum::<f64>() / laps.len() as f64;
        var.sqrt()
    }
}

impl FromIterator<f64> for Laps {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Laps(iter.into_iter().collect())
    }
}

/// Start-to-end time of a finished command, from the queue's profiling
/// counters. `None` if the queue was created without profiling.
pub fn event_seconds(event: &Event) -> Option<f64> {
    let start = event.profiling_command_start().ok()?;
    let end = event.profiling_command_end().ok()?;
    Some(end.saturating_sub(start) as f64 * 1e-9)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn few_laps_are_not_filtered() {
        let laps: Laps = [3.0, 1.0, 2.0].into_iter().collect();
        assert_eq!(laps.filtered(), vec![1.0, 2.0, 3.0]);
        assert!(close(laps.avg(), 2.0));
    }

    #[test]
    fn outer_fifths_are_dropped() {
        // 20 laps: 4 dropped on each side, 1.0 everywhere in the middle
        let mut laps = Laps::default();
        for _ in 0..4 {
            laps.push(0.001);
            laps.push(50.0);
        }
        for _ in 0..12 {
            laps.push(1.0);
        }
        assert_eq!(laps.len(), 20);
        assert_eq!(laps.filtered().len(), 12);
        assert!(close(laps.avg(), 1.0));
        assert!(close(laps.std(), 0.0));
    }

    #[test]
    fn std_is_population_deviation() {
        let laps: Laps = [1.0, 3.0].into_iter().collect();
        assert!(close(laps.avg(), 2.0));
        assert!(close(laps.std(), 1.0));
    }

    #[test]
    fn empty_laps_give_zero() {
        let laps = Laps::default();
        assert_eq!(laps.avg(), 0.0);
        assert_eq!(laps.std(), 0.0);
    }

    #[test]
    fn stopwatch_records_each_lap() {
        let mut sw = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(2));
        let lap = sw.next_lap();
        sw.next_lap();
        assert!(lap >= Duration::from_millis(2));
        assert_eq!(sw.laps().len(), 2);
        assert!(sw.into_laps().as_slice()[0] >= 0.002);
    }
}
