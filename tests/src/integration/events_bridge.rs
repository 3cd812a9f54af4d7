//! # Events Transport Scenarios
//!
//! `invoke` over the broker: publish a request, let a responder consume it
//! and publish a correlated reply on the results topic, resolve the waiter.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::Harness;
    use async_trait::async_trait;
    use futures::future::join_all;
    use parking_lot::Mutex;
    use rand::Rng;
    use rw_dispatch::{DispatchError, HandlerError, HandlerTable};
    use rw_runtime::{users_table, UserStore};
    use serde_json::json;
    use shared_bus::{Envelope, EventPublisher, MessageHandler};
    use shared_types::dto::{GetUserByUsernameRequest, UserMessage};
    use shared_types::operations::GetUserByUsername;
    use shared_types::{ServiceName, Transport};
    use std::sync::Arc;
    use std::time::Duration;

    fn by_username(username: &str) -> GetUserByUsernameRequest {
        GetUserByUsernameRequest {
            username: username.to_string(),
        }
    }

    async fn harness_with_users() -> (Harness, Arc<UserStore>) {
        let mut harness = Harness::new().await;
        let store = Arc::new(UserStore::new());
        harness.serve(users_table(store.clone()).unwrap()).await;
        (harness, store)
    }

    #[tokio::test]
    async fn test_get_user_by_username_over_events() {
        let (harness, store) = harness_with_users().await;
        let alice = store.create("alice", "wonderland").unwrap();

        let user = tokio::time::timeout(
            Duration::from_secs(1),
            harness
                .invoker
                .invoke::<GetUserByUsername>(Transport::Events, &by_username("alice")),
        )
        .await
        .expect("response within one second")
        .unwrap();

        assert_eq!(user, alice);
        assert_eq!(harness.registry.pending_count(), 0);
        harness.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_responder_times_out_after_three_seconds() {
        let harness = Harness::new().await;

        let started = tokio::time::Instant::now();
        let err = harness
            .invoker
            .invoke::<GetUserByUsername>(Transport::Events, &by_username("alice"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ResponseTimeout { .. }));
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(harness.registry.pending_count(), 0);
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_handler_failure_fails_fast_with_remote_error() {
        let (harness, _store) = harness_with_users().await;

        let err = harness
            .invoker
            .invoke::<GetUserByUsername>(Transport::Events, &by_username("nobody"))
            .await
            .unwrap_err();

        match err {
            DispatchError::Remote {
                error: HandlerError::NotFound(message),
                ..
            } => assert_eq!(message, "user nobody"),
            other => panic!("expected remote not-found error, got {other:?}"),
        }
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_undecodable_request_fails_fast() {
        let (harness, _store) = harness_with_users().await;

        let err = harness
            .invoker
            .invoke_raw(
                Transport::Events,
                "users",
                "getUserByUsername",
                json!({"user": 42}),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Remote {
                error: HandlerError::InvalidRequest(_),
                ..
            }
        ));
        assert_eq!(err.http_status(), 400);
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_operation_is_rejected_before_publishing() {
        let harness = Harness::new().await;

        let err = harness
            .invoker
            .invoke_raw(Transport::Events, "users", "explode", json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnknownOperation { .. }));
        assert_eq!(harness.publisher.events_published(), 0);
        harness.stop().await;
    }

    /// Holds requests until two arrived, then answers them newest first.
    struct ReverseOrder {
        publisher: Arc<dyn EventPublisher>,
        results_topic: String,
        held: Mutex<Vec<Envelope>>,
    }

    #[async_trait]
    impl MessageHandler for ReverseOrder {
        async fn handle(&self, envelope: Envelope) {
            let batch = {
                let mut held = self.held.lock();
                held.push(envelope);
                if held.len() < 2 {
                    return;
                }
                std::mem::take(&mut *held)
            };
            for request in batch.into_iter().rev() {
                let ask: GetUserByUsernameRequest = request.decode_payload().unwrap();
                let user = UserMessage {
                    id: format!("id-{}", ask.username),
                    username: ask.username,
                };
                let reply = Envelope::response(request.correlation_id.clone(), &user).unwrap();
                self.publisher.publish(&self.results_topic, reply).await.unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_own_callers() {
        let mut harness = Harness::new().await;
        let handler = Arc::new(ReverseOrder {
            publisher: harness.publisher.clone(),
            results_topic: harness.config.results_topic.clone(),
            held: Mutex::new(Vec::new()),
        });
        harness.serve_with("users", handler).await;

        let invoker = harness.invoker.clone();
        let alice_request = by_username("alice");
        let bob_request = by_username("bob");
        let (alice, bob) = tokio::join!(
            invoker.invoke::<GetUserByUsername>(Transport::Events, &alice_request),
            invoker.invoke::<GetUserByUsername>(Transport::Events, &bob_request),
        );

        assert_eq!(alice.unwrap().id, "id-alice");
        assert_eq!(bob.unwrap().id, "id-bob");
        harness.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_invokes_with_random_latency() {
        let mut harness = Harness::new().await;
        let mut table = HandlerTable::new(ServiceName::Users);
        table
            .register::<GetUserByUsername, _, _>(|request: GetUserByUsernameRequest| {
                let delay = rand::thread_rng().gen_range(0..40u64);
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok::<_, HandlerError>(UserMessage {
                        id: format!("id-{}", request.username),
                        username: request.username,
                    })
                }
            })
            .unwrap();
        harness.serve(table).await;

        let calls = (0..32).map(|i| {
            let invoker = harness.invoker.clone();
            async move {
                let username = format!("user-{i}");
                let user = invoker
                    .invoke::<GetUserByUsername>(Transport::Events, &by_username(&username))
                    .await
                    .unwrap();
                (username, user)
            }
        });

        for (username, user) in join_all(calls).await {
            assert_eq!(user.id, format!("id-{username}"));
            assert_eq!(user.username, username);
        }
        assert_eq!(harness.registry.pending_count(), 0);
        harness.stop().await;
    }

    #[tokio::test]
    async fn test_renamed_event_reaches_its_handler() {
        let renamed = crate::integration::fixtures::SERVICES_TOML
            .replace("users:get_data_by_username", "users.lookup");
        let directory = rw_dispatch::ServiceDirectory::from_toml_str(&renamed).unwrap();
        let mut harness = Harness::with_directory(directory).await;
        let store = Arc::new(UserStore::new());
        harness.serve(users_table(store.clone()).unwrap()).await;
        let alice = store.create("alice", "wonderland").unwrap();

        let user = harness
            .invoker
            .invoke::<GetUserByUsername>(Transport::Events, &by_username("alice"))
            .await
            .unwrap();

        assert_eq!(user.id, alice.id);
        harness.stop().await;
    }
}
