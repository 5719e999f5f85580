//! Panic recovery for agent code.
//!
//! Input mappers and agent handlers are supplied by the embedding application.
//! A panic in one of them must end up as a failed step on the run record, not
//! as an unwinding orchestrator.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a closure, converting a panic into an error message.
pub fn catch_panic<F, T>(operation: F, operation_name: &str) -> Result<T, String>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(operation)).map_err(|payload| {
        let panic_msg = extract_panic_message(payload.as_ref());
        tracing::error!(
            operation = operation_name,
            panic = %panic_msg,
            "panic_recovered"
        );
        format!("panic in {}: {}", operation_name, panic_msg)
    })
}

/// Poll a future to completion, converting a panic into an error message.
pub async fn catch_panic_async<Fut, T>(future: Fut, operation_name: &str) -> Result<T, String>
where
    Fut: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(payload) => {
            let panic_msg = extract_panic_message(payload.as_ref());
            tracing::error!(
                operation = operation_name,
                panic = %panic_msg,
                "async_panic_recovered"
            );
            Err(format!("panic in {}: {}", operation_name, panic_msg))
        }
    }
}

/// Extract panic message from panic payload.
fn extract_panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic (no message)".to_string()
    }
}
