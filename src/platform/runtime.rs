use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed timer future handed out by [`timer`]; `Send` on native targets only.
#[cfg(target_arch = "wasm32")]
pub type Timer = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Boxed timer future handed out by [`timer`]; `Send` on native targets only.
#[cfg(not(target_arch = "wasm32"))]
pub type Timer = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Asynchronously waits for the provided duration in a platform-compatible way.
pub async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    sleep_impl(duration).await;
}

/// Returns a boxed [`sleep`] that can be stored and polled by hand, or `None` when the current
/// thread has no timer driver to back it.
///
/// Natively that means no Tokio runtime is entered, e.g. under `futures::executor::block_on`.
/// Call it from the task that will poll the timer.
#[cfg(not(target_arch = "wasm32"))]
pub fn timer(duration: Duration) -> Option<Timer> {
    tokio::runtime::Handle::try_current().ok()?;
    Some(Box::pin(sleep(duration)))
}

/// Returns a boxed [`sleep`] that can be stored and polled by hand.
#[cfg(target_arch = "wasm32")]
pub fn timer(duration: Duration) -> Option<Timer> {
    Some(Box::pin(sleep(duration)))
}

#[cfg(target_arch = "wasm32")]
async fn sleep_impl(duration: Duration) {
    use gloo_timers::future::sleep;
    sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
async fn sleep_impl(duration: Duration) {
    use tokio::time::sleep;
    sleep(duration).await;
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test(flavor = "current_thread")]
    async fn zero_duration_returns_immediately() {
        let started = Instant::now();
        sleep(Duration::ZERO).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn timer_waits_at_least_the_duration() {
        let started = Instant::now();
        timer(Duration::from_millis(20))
            .expect("inside a runtime")
            .await;
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn no_timer_outside_a_runtime() {
        assert!(timer(Duration::from_millis(20)).is_none());
    }
}
