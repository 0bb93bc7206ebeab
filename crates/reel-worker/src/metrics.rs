//! Job-level worker metrics.

use metrics::{counter, gauge};

pub mod names {
    pub const JOBS_TOTAL: &str = "reel_jobs_total";
    pub const JOBS_IN_FLIGHT: &str = "reel_jobs_in_flight";
}

/// Terminal outcome of a job as reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Complete,
    Failed,
    TimedOut,
    /// The task ended without reporting, e.g. it panicked
    Aborted,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Complete => "complete",
            JobOutcome::Failed => "failed",
            JobOutcome::TimedOut => "timed_out",
            JobOutcome::Aborted => "aborted",
        }
    }
}

/// Holds a job in the in-flight gauge until dropped.
///
/// A guard dropped without [`JobMetrics::finish`] counts as aborted.
#[derive(Debug)]
pub struct JobMetrics {
    outcome: Option<JobOutcome>,
}

impl JobMetrics {
    pub fn start() -> Self {
        gauge!(names::JOBS_IN_FLIGHT).increment(1.0);
        Self { outcome: None }
    }

    pub fn finish(mut self, outcome: JobOutcome) {
        self.outcome = Some(outcome);
    }
}

impl Drop for JobMetrics {
    fn drop(&mut self) {
        gauge!(names::JOBS_IN_FLIGHT).decrement(1.0);
        let outcome = self.outcome.unwrap_or(JobOutcome::Aborted);
        let labels = [("outcome", outcome.as_str().to_string())];
        counter!(names::JOBS_TOTAL, &labels).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    /// Keeps the in-flight gauge and one counter per outcome label.
    #[derive(Default)]
    struct TestRecorder {
        in_flight: Arc<AtomicU64>,
        outcomes: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl TestRecorder {
        fn in_flight(&self) -> f64 {
            f64::from_bits(self.in_flight.load(Ordering::SeqCst))
        }

        fn outcome(&self, name: &str) -> u64 {
            self.outcomes
                .lock()
                .unwrap()
                .get(name)
                .map_or(0, |c| c.load(Ordering::SeqCst))
        }
    }

    impl Recorder for TestRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let outcome = key
                .labels()
                .find(|l| l.key() == "outcome")
                .map(|l| l.value().to_string())
                .unwrap_or_default();
            let cell = self.outcomes.lock().unwrap().entry(outcome).or_default().clone();
            Counter::from_arc(cell)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(self.in_flight.clone())
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_finished_job_leaves_gauge() {
        let recorder = TestRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let job = JobMetrics::start();
            assert_eq!(recorder.in_flight(), 1.0);
            job.finish(JobOutcome::TimedOut);
        });
        assert_eq!(recorder.in_flight(), 0.0);
        assert_eq!(recorder.outcome("timed_out"), 1);
    }

    #[test]
    fn test_panicking_job_leaves_gauge() {
        let recorder = TestRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            let result = std::panic::catch_unwind(|| {
                let _job = JobMetrics::start();
                panic!("render task panicked");
            });
            assert!(result.is_err());
        });
        assert_eq!(recorder.in_flight(), 0.0);
        assert_eq!(recorder.outcome("aborted"), 1);
        assert_eq!(recorder.outcome("complete"), 0);
    }
}
