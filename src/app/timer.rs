/// Single-interval stopwatch over the monotonic clock. `duration_ms` reports
/// 0.0 until a full start/stop pair has been recorded; an incomplete
/// interval is never an error.
#[derive(Debug, Default, Clone, Copy)]
struct StopWatch {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl StopWatch {
    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    fn stop(&mut self) {
        self.stopped = Some(Instant::now());
    }

    fn reset(&mut self) {
        self.started = None;
        self.stopped = None;
    }

    fn duration_ms(&self) -> f64 {
        match (self.started, self.stopped) {
            (Some(started), Some(stopped)) => {
                stopped.saturating_duration_since(started).as_secs_f64() * 1000.0
            }
            _ => 0.0,
        }
    }
}
