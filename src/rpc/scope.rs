//! Handler propagation scope.
//!
//! While a server handler runs, the values its observer exported through
//! `CallObserver::propagation` are visible to any client call the handler makes.
//! The scope is task-local: work the handler spawns onto other tasks does not
//! inherit it.

use std::future::Future;

use crate::rpc::metadata::Metadata;

tokio::task_local! {
    static CALL_SCOPE: Metadata;
}

/// Propagation values of the handler running on this task.
pub fn current() -> Option<Metadata> {
    CALL_SCOPE.try_with(Clone::clone).ok()
}

/// Runs `fut` with `values` as the current propagation scope.
pub async fn scope<F: Future>(values: Metadata, fut: F) -> F::Output {
    CALL_SCOPE.scope(values, fut).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scope_visibility() {
        assert!(current().is_none());

        let mut values = Metadata::new();
        values.insert("traceparent", "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01");

        let seen = scope(values.clone(), async { current() }).await;
        assert_eq!(seen, Some(values));
        assert!(current().is_none());
    }
}
