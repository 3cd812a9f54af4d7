//! # Correlation Registry Scenarios
//!
//! The registry on its own: one waiter per id, first outcome wins, late and
//! unknown responses are dropped without disturbing anyone else.

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use rand::Rng;
    use rw_dispatch::{CorrelationId, CorrelationRegistry, DispatchError};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[tokio::test]
    async fn test_resolve_delivers_to_waiter() {
        let registry = CorrelationRegistry::<String>::new();
        let handle = registry.register(CorrelationId::from("c-1"), "users/getUserByUsername").unwrap();

        let resolver = registry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            assert!(resolver.resolve("c-1", "alice".to_string()));
        });

        assert_eq!(handle.wait(TIMEOUT).await.unwrap(), "alice");
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_call_times_out_after_three_seconds() {
        let registry = CorrelationRegistry::<String>::new();
        let handle = registry.register(CorrelationId::from("c-2"), "auth/login").unwrap();

        let started = tokio::time::Instant::now();
        let err = handle.wait(TIMEOUT).await.unwrap_err();

        assert!(matches!(err, DispatchError::ResponseTimeout { timeout, .. } if timeout == TIMEOUT));
        assert!(started.elapsed() >= TIMEOUT);
        assert!(!registry.is_pending("c-2"));

        // The late response finds nobody and is dropped.
        assert!(!registry.resolve("c-2", "late".to_string()));
        assert_eq!(registry.stats().snapshot().timeouts, 1);
        assert_eq!(registry.stats().snapshot().unknown, 1);
    }

    #[tokio::test]
    async fn test_unknown_resolve_leaves_pending_calls_alone() {
        let registry = CorrelationRegistry::<String>::new();
        let _handle = registry.register(CorrelationId::from("c-3"), "users/getUserData").unwrap();

        assert!(!registry.resolve("nobody-asked", "x".to_string()));
        assert!(registry.is_pending("c-3"));
        assert_eq!(registry.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_rejected() {
        let registry = CorrelationRegistry::<String>::new();
        let _first = registry.register(CorrelationId::from("dup"), "auth/login").unwrap();

        let second = registry.register(CorrelationId::from("dup"), "auth/login");
        assert!(matches!(second, Err(DispatchError::DuplicateCorrelationId(_))));
    }

    #[tokio::test]
    async fn test_second_resolve_is_a_no_op() {
        let registry = CorrelationRegistry::<String>::new();
        let handle = registry.register(CorrelationId::from("once"), "users/deleteUser").unwrap();

        assert!(registry.resolve("once", "first".to_string()));
        assert!(!registry.resolve("once", "second".to_string()));
        assert_eq!(handle.wait(TIMEOUT).await.unwrap(), "first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_resolved_in_random_order_are_not_cross_wired() {
        let registry = CorrelationRegistry::<String>::new();
        let ids: Vec<CorrelationId> = (0..64).map(|_| CorrelationId::new()).collect();

        let waiters: Vec<_> = ids
            .iter()
            .map(|id| {
                let handle = registry.register(id.clone(), "users/getUserData").unwrap();
                let expected = format!("payload-{id}");
                async move { (expected, handle.wait(TIMEOUT).await.unwrap()) }
            })
            .collect();

        for id in &ids {
            let resolver = registry.clone();
            let id = id.clone();
            let delay = rand::thread_rng().gen_range(0..30);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                resolver.resolve(id.as_str(), format!("payload-{id}"));
            });
        }

        for (expected, received) in join_all(waiters).await {
            assert_eq!(expected, received);
        }
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let registry = CorrelationRegistry::<String>::new();
        let handle = registry.register(CorrelationId::from("c-4"), "pictures/getUserPictures").unwrap();

        assert!(registry.cancel("c-4"));
        assert!(matches!(
            handle.wait(TIMEOUT).await,
            Err(DispatchError::Cancelled(_))
        ));
    }
}
