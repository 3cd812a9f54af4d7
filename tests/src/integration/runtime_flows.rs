//! # Runtime Flows
//!
//! The service runtime hosting users and auth on the shipped directory:
//! auth reaches users through the bridge, and callers reach auth the same way.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::SERVICES_TOML;
    use rw_dispatch::{DispatchError, HandlerError, ServiceDirectory};
    use rw_runtime::{RuntimeConfig, ServiceRuntime};
    use shared_types::dto::Credentials;
    use shared_types::operations::{Login, Signup};
    use shared_bus::InMemoryBroker;
    use shared_types::{ServiceName, Transport};
    use std::sync::Arc;

    async fn start() -> ServiceRuntime {
        let directory = ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap();
        ServiceRuntime::start(&RuntimeConfig::default(), directory)
            .await
            .unwrap()
    }

    fn bob(password: &str) -> Credentials {
        Credentials {
            username: "bob".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn test_login_then_validate_privileged_call() {
        let runtime = start().await;
        let invoker = runtime.invoker();

        invoker
            .invoke::<Signup>(Transport::Events, &bob("builder"))
            .await
            .unwrap();
        let token = invoker
            .invoke::<Login>(Transport::Events, &bob("builder"))
            .await
            .unwrap()
            .access_token;

        let validation = invoker
            .validate_request(Transport::Events, &token, "pictures:create_user_picture")
            .await
            .unwrap();
        let stored = runtime.users().unwrap().get_by_username("bob").unwrap();
        assert_eq!(validation.user_id, stored.id);

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_token_is_rejected() {
        let runtime = start().await;

        let err = runtime
            .invoker()
            .validate_request(Transport::Events, "forged", "analytics:get_logs")
            .await
            .unwrap_err();

        match err {
            DispatchError::Remote {
                error: HandlerError::Unauthorized(_),
                ..
            } => {}
            other => panic!("expected remote unauthorized error, got {other:?}"),
        }
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_a_conflict() {
        let runtime = start().await;
        let invoker = runtime.invoker();

        invoker
            .invoke::<Signup>(Transport::Events, &bob("builder"))
            .await
            .unwrap();
        let err = invoker
            .invoke::<Signup>(Transport::Events, &bob("other"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Remote {
                error: HandlerError::Conflict(ref message),
                ..
            } if message == "username bob is taken"
        ));
        assert_eq!(err.http_status(), 409);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_self_check_on_shipped_directory() {
        let runtime = start().await;
        runtime.self_check().await.unwrap();
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_auth_only_process_self_check() {
        let config = RuntimeConfig {
            services: vec![ServiceName::Auth],
            ..RuntimeConfig::default()
        };
        let directory = ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap();
        let runtime = ServiceRuntime::start(&config, directory).await.unwrap();

        let started = tokio::time::Instant::now();
        runtime.self_check().await.unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_request_topic_stops_the_runtime() {
        let broker = Arc::new(InMemoryBroker::new());
        let directory = ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap();
        let mut runtime =
            ServiceRuntime::start_with_broker(&RuntimeConfig::default(), directory, broker.clone())
                .await
                .unwrap();

        assert!(broker.close_topic("auth"));

        let (name, outcome) = runtime.wait_for_failure().await;
        assert_eq!(name, "auth");
        assert!(outcome.is_err());
        runtime.shutdown().await;
    }
}
