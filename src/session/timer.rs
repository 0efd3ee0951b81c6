//! One logical timer per session.
//!
//! Arming bumps a generation counter and spawns a task that sleeps until the
//! deadline, then runs the provided firing future with the generation it was
//! armed under. The firing path must re-check `is_current` under the session
//! lock before committing anything: a superseded or killed generation is a
//! no-op even if the task already woke up. The task abort is best-effort;
//! correctness comes from the generation check alone.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct PhaseTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `generation` is the most recently armed one and the timer
    /// has not been killed since.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.handle.is_some()
    }

    /// Arm the timer. Any pending deadline is superseded: its generation can
    /// never pass `is_current` again.
    pub fn arm<F, Fut>(&mut self, deadline: DateTime<Utc>, fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disarm();
        self.generation += 1;
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(until(deadline)).await;
            fire(generation).await;
        }));
    }

    /// Cancel the pending deadline, if any. A timer that already started
    /// firing sees a stale generation and does nothing.
    pub fn kill(&mut self) {
        self.disarm();
        self.generation += 1;
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Time left until `deadline`, saturating at zero.
pub fn until(deadline: DateTime<Utc>) -> Duration {
    (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn counting_fire(
        timer: Arc<Mutex<PhaseTimer>>,
        count: Arc<AtomicU32>,
    ) -> impl FnOnce(u64) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> {
        move |generation| {
            Box::pin(async move {
                let guard = timer.lock().await;
                if guard.is_current(generation) {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
        }
    }

    fn in_ms(ms: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn test_timer_fires_once() {
        let timer = Arc::new(Mutex::new(PhaseTimer::new()));
        let count = Arc::new(AtomicU32::new(0));
        timer
            .lock()
            .await
            .arm(in_ms(20), counting_fire(timer.clone(), count.clone()));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timer_supersession_only_second_fires() {
        let timer = Arc::new(Mutex::new(PhaseTimer::new()));
        let count = Arc::new(AtomicU32::new(0));
        {
            let mut guard = timer.lock().await;
            guard.arm(in_ms(30), counting_fire(timer.clone(), count.clone()));
            guard.arm(in_ms(60), counting_fire(timer.clone(), count.clone()));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
        // Both deadlines have elapsed; exactly one callback ran.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_killed_timer_never_fires() {
        let timer = Arc::new(Mutex::new(PhaseTimer::new()));
        let count = Arc::new(AtomicU32::new(0));
        {
            let mut guard = timer.lock().await;
            guard.arm(in_ms(30), counting_fire(timer.clone(), count.clone()));
            guard.kill();
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_past_deadline_fires_immediately() {
        let timer = Arc::new(Mutex::new(PhaseTimer::new()));
        let count = Arc::new(AtomicU32::new(0));
        timer
            .lock()
            .await
            .arm(in_ms(-100), counting_fire(timer.clone(), count.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
