//! # REST / RPC Scenarios
//!
//! The synchronous transports through the same `invoke` entry point, with
//! scripted clients in place of real downstream services, addressed by the
//! directory the runtime ships.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{directory, SERVICES_TOML};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rw_dispatch::{
        CorrelationRegistry, DispatchConfig, DispatchError, HttpMethod, Invoker, RestRequest,
        RestTransport, RpcClient, RpcClientSet, RpcMetadata, ServiceDirectory, TransportAddress,
    };
    use serde_json::{json, Value};
    use shared_bus::{EnvelopePublisher, InMemoryBroker};
    use shared_types::dto::{Credentials, GetUserByUsernameRequest, GetUserPicturesRequest};
    use shared_types::operations::{GetUserByUsername, GetUserPictures, Login};
    use shared_types::{OperationId, ServiceName, Transport};
    use std::sync::Arc;
    use std::time::Duration;

    struct ScriptedRest {
        seen: Mutex<Vec<RestRequest>>,
        reply: Result<Value, DispatchError>,
    }

    #[async_trait]
    impl RestTransport for ScriptedRest {
        async fn send(&self, request: RestRequest) -> Result<Value, DispatchError> {
            self.seen.lock().push(request);
            self.reply.clone()
        }
    }

    struct ScriptedRpc {
        seen: Mutex<Vec<(String, RpcMetadata)>>,
        delay: Duration,
    }

    #[async_trait]
    impl RpcClient for ScriptedRpc {
        async fn call(
            &self,
            method: &str,
            request: Value,
            metadata: RpcMetadata,
        ) -> Result<Value, DispatchError> {
            self.seen.lock().push((method.to_string(), metadata));
            tokio::time::sleep(self.delay).await;
            Ok(json!({"id": "u-1", "username": request["username"]}))
        }
    }

    fn invoker(rest: Option<Arc<ScriptedRest>>, rpc: RpcClientSet) -> Invoker {
        let broker = Arc::new(InMemoryBroker::new());
        let publisher = Arc::new(EnvelopePublisher::new(
            broker,
            Arc::new(rw_telemetry::NoopPropagator),
        ));
        let mut builder = Invoker::builder(directory(), CorrelationRegistry::new(), publisher)
            .rpc(rpc)
            .config(DispatchConfig::default());
        if let Some(rest) = rest {
            builder = builder.rest(rest);
        }
        builder.build()
    }

    fn alice() -> GetUserByUsernameRequest {
        GetUserByUsernameRequest {
            username: "alice".into(),
        }
    }

    #[test]
    fn test_shipped_directory_covers_every_operation_on_every_transport() {
        let directory = ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap();
        directory.ensure_covers(OperationId::ALL).unwrap();
        assert_eq!(directory.operation_count(), OperationId::ALL.len());

        for op in OperationId::ALL {
            let descriptor = directory.descriptor(*op).unwrap();
            for transport in [Transport::Rest, Transport::Rpc, Transport::Events] {
                assert!(descriptor.address(transport).is_some(), "{op} over {transport}");
            }
            assert_eq!(descriptor.routes().event.as_deref(), Some(op.event_key()));
        }
    }

    #[tokio::test]
    async fn test_rest_call_uses_directory_address() {
        let rest = Arc::new(ScriptedRest {
            seen: Mutex::new(Vec::new()),
            reply: Ok(json!({"id": "u-1", "username": "alice"})),
        });
        let invoker = invoker(Some(rest.clone()), RpcClientSet::new());

        let user = invoker
            .invoke::<GetUserByUsername>(Transport::Rest, &alice())
            .await
            .unwrap();
        assert_eq!(user.id, "u-1");

        let seen = rest.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(seen[0].url, "http://127.0.0.1:8081/users/by-username");
        assert_eq!(seen[0].body, json!({"username": "alice"}));
        assert_eq!(seen[0].timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_rest_failure_carries_status() {
        let rest = Arc::new(ScriptedRest {
            seen: Mutex::new(Vec::new()),
            reply: Err(DispatchError::Transport {
                status: Some(503),
                cause: "users unavailable".into(),
            }),
        });
        let invoker = invoker(Some(rest), RpcClientSet::new());

        let err = invoker
            .invoke::<Login>(
                Transport::Rest,
                &Credentials {
                    username: "alice".into(),
                    password: "pw".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Transport { status: Some(503), .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rpc_routes_to_service_stub() {
        let users = Arc::new(ScriptedRpc {
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        });
        let invoker = invoker(None, RpcClientSet::new().with(ServiceName::Users, users.clone()));

        let user = invoker
            .invoke::<GetUserByUsername>(Transport::Rpc, &alice())
            .await
            .unwrap();
        assert_eq!(user.username, "alice");

        let seen = users.seen.lock();
        assert_eq!(seen[0].0, "GetUserDataByUsername");
        assert_eq!(seen[0].1.deadline, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_rpc_without_stub_is_no_route() {
        let users = Arc::new(ScriptedRpc {
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        });
        let invoker = invoker(None, RpcClientSet::new().with(ServiceName::Users, users));

        let err = invoker
            .invoke::<GetUserPictures>(
                Transport::Rpc,
                &GetUserPicturesRequest {
                    user_id: "u-1".into(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::NoRoute {
                transport: Transport::Rpc,
                operation: OperationId::GetUserPictures,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpc_deadline_is_enforced() {
        let slow = Arc::new(ScriptedRpc {
            seen: Mutex::new(Vec::new()),
            delay: Duration::from_secs(30),
        });
        let invoker = invoker(None, RpcClientSet::new().with(ServiceName::Users, slow));

        let err = invoker
            .invoke::<GetUserByUsername>(Transport::Rpc, &alice())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Transport { status: None, .. }));
    }

    #[tokio::test]
    async fn test_missing_rest_client_is_no_route() {
        let invoker = invoker(None, RpcClientSet::new());

        let err = invoker
            .invoke::<GetUserByUsername>(Transport::Rest, &alice())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoRoute { transport: Transport::Rest, .. }));
    }

    #[test]
    fn test_rest_address_joins_base_url() {
        let directory = directory();
        let address = directory
            .descriptor(OperationId::CreateUserPicture)
            .unwrap()
            .require(Transport::Rest)
            .unwrap();
        assert_eq!(
            address,
            TransportAddress::Rest {
                url: "http://127.0.0.1:8083/pictures".into(),
                method: HttpMethod::Post,
            }
        );
    }
}
