//! Fixed-interval progress ticks while a future is outstanding.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::errors::ChoiceError;

type TickFn<'a> = Box<dyn FnMut(Duration) + Send + 'a>;

/// Calls a tick callback every `interval_ms` until the watched future settles.
///
/// Ticking runs on the caller's task; nothing is spawned. The callback receives the time elapsed
/// since polling started and is best-effort feedback only: a tick can land just before the future
/// settles. There is no timeout, so the watched future must settle on its own.
pub struct PollUntilResolved<'a> {
    on_tick: Option<TickFn<'a>>,
    interval_ms: u64,
}

impl<'a> PollUntilResolved<'a> {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            on_tick: None,
            interval_ms,
        }
    }

    pub fn on_tick(mut self, on_tick: impl FnMut(Duration) + Send + 'a) -> Self {
        self.on_tick = Some(Box::new(on_tick));
        self
    }

    /// Drive `future` to completion, ticking meanwhile, and hand back its output untouched.
    ///
    /// Fails with [`ChoiceError::InvalidArgument`] before `future` is first polled when no tick
    /// callback was supplied or the interval is zero.
    pub async fn run<F: Future>(self, future: F) -> Result<F::Output, ChoiceError> {
        let Some(mut on_tick) = self.on_tick else {
            return Err(ChoiceError::invalid("poll requires an on_tick callback"));
        };
        if self.interval_ms == 0 {
            return Err(ChoiceError::invalid("poll interval must be a positive number of milliseconds"));
        }

        let interval = Duration::from_millis(self.interval_ms);
        let started = Instant::now();
        tokio::pin!(future);

        loop {
            tokio::select! {
                biased;
                output = &mut future => return Ok(output),
                _ = tokio::time::sleep(interval) => on_tick(started.elapsed()),
            }
        }
    }
}
