
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{error, info};


fn report<T, E: Display>(operation: &str, elapsed: Duration, result: &Result<T, E>) {
    let elapsed_ms = (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    match result {
        Ok(_) => info!(operation, elapsed_ms, status = "success", "Operation executed"),
        Err(e) => error!(
            operation,
            elapsed_ms,
            status = "error",
            error = %e,
            "Operation failed"
        ),
    }
}

/// Times an async operation and logs its outcome. The result passes through.
pub async fn timed<T, E, F>(operation: &str, fut: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    report(operation, start.elapsed(), &result);
    result
}


pub fn timed_sync<T, E, F>(operation: &str, f: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = f();
    report(operation, start.elapsed(), &result);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timed_passes_result_through() {
        let ok: Result<u32, String> = timed("ok_op", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = timed("err_op", async { Err("boom".to_string()) }).await;
        assert_eq!(err, Err("boom".to_string()));
    }

    #[test]
    fn test_timed_sync_passes_result_through() {
        let value: Result<&str, String> = timed_sync("sync_op", || Ok("done"));
        assert_eq!(value, Ok("done"));
    }
}
