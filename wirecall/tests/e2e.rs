//! End-to-end exercises of the full call path: typed client wrapper over a
//! pooled connection against a served registry, with the json encoding.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use wirecall::client::{PoolConfiguration, RpcClient};
use wirecall::server::{Server, ServiceHandler};
use wirecall::{CallOptions, Encoding, Error, Reply, Serializer};
use wirecall_json::JsonSerializer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GreetRequest {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GreetResponse {
    message: String,
}

/// The hand-written per-rpc wrapper the framework expects applications to
/// provide: one async method per remote method, delegating to `call`.
struct GreeterClient {
    inner: RpcClient<JsonSerializer>,
}

impl GreeterClient {
    async fn connect(address: String, configuration: PoolConfiguration) -> wirecall::Result<Self> {
        Ok(Self {
            inner: RpcClient::connect(address, JsonSerializer, configuration).await?,
        })
    }

    async fn greet(
        &self,
        options: CallOptions,
        request: &GreetRequest,
    ) -> wirecall::Result<Reply<GreetResponse>> {
        self.inner.call("greeter", "greet", options, request).await
    }

    async fn grumble(
        &self,
        options: CallOptions,
        request: &GreetRequest,
    ) -> wirecall::Result<Reply<GreetResponse>> {
        self.inner.call("greeter", "grumble", options, request).await
    }

    async fn greet_reluctantly(
        &self,
        options: CallOptions,
        request: &GreetRequest,
    ) -> wirecall::Result<Reply<GreetResponse>> {
        self.inner
            .call("greeter", "greet_reluctantly", options, request)
            .await
    }

    async fn greet_slowly(
        &self,
        options: CallOptions,
        request: &GreetRequest,
    ) -> wirecall::Result<Reply<GreetResponse>> {
        self.inner
            .call("greeter", "greet_slowly", options, request)
            .await
    }
}

fn greeter_service() -> ServiceHandler {
    let mut service = ServiceHandler::new("greeter").expect("valid service name");
    service
        .register("greet", JsonSerializer, |_context, request: GreetRequest| async move {
            Reply::ok(GreetResponse {
                message: format!("hello {}", request.name),
            })
        })
        .expect("register greet");
    service
        .register(
            "grumble",
            JsonSerializer,
            |_context, _request: GreetRequest| async move {
                Reply::<GreetResponse>::err("test error")
            },
        )
        .expect("register grumble");
    service
        .register(
            "greet_reluctantly",
            JsonSerializer,
            |_context, request: GreetRequest| async move {
                Reply::partial(
                    GreetResponse {
                        message: format!("hello {}", request.name),
                    },
                    "test error",
                )
            },
        )
        .expect("register greet_reluctantly");
    service
        .register(
            "greet_slowly",
            JsonSerializer,
            |context: wirecall::CallContext, request: GreetRequest| async move {
                // callers of this method are expected to set a deadline
                if context.deadline().is_none() {
                    return Reply::err("no deadline set");
                }
                tokio::time::sleep(Duration::from_millis(200)).await;
                Reply::ok(GreetResponse {
                    message: format!("hello {}", request.name),
                })
            },
        )
        .expect("register greet_slowly");
    service
}

async fn start_server() -> String {
    let _ = env_logger::try_init();
    let mut server = Server::new();
    server
        .register_service(greeter_service())
        .expect("register service");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_addr().expect("local addr").to_string();
    tokio::spawn(server.serve_on(listener));
    address
}

fn pool_configuration() -> PoolConfiguration {
    PoolConfiguration {
        initial_connections: 0,
        max_connections: 4,
        max_idle_connections: 4,
        ..PoolConfiguration::default()
    }
}

#[tokio::test]
async fn successful_call_round_trips() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    let reply = client
        .greet(
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("call succeeds");
    assert_eq!(
        reply.value(),
        Some(&GreetResponse {
            message: "hello world".to_string()
        })
    );
    assert!(reply.error().is_none());
}

#[tokio::test]
async fn business_error_reaches_the_caller() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    let reply = client
        .grumble(
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert!(reply.value().is_none());
    assert_eq!(reply.error().map(|e| e.message()), Some("test error"));
}

#[tokio::test]
async fn partial_result_and_error_both_reach_the_caller() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    let reply = client
        .greet_reluctantly(
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert_eq!(
        reply.value().map(|value| value.message.as_str()),
        Some("hello world")
    );
    assert_eq!(reply.error().map(|e| e.message()), Some("test error"));
}

#[tokio::test]
async fn oneway_calls_return_the_fixed_local_error() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    let started = Instant::now();
    let result = client
        .greet_slowly(
            CallOptions::new()
                .with_timeout(Duration::from_secs(5))
                .oneway(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(Error::OnewayResult)));
    // never waited on the slow handler
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn deadline_aborts_a_slow_call_locally() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    // handler sleeps 200ms; give up after 50ms
    let result = client
        .greet_slowly(
            CallOptions::new().with_timeout(Duration::from_millis(50)),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(Error::DeadlineExceeded)));
}

#[tokio::test]
async fn deadline_meta_reaches_the_handler() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    // generous deadline: the call completes, and the handler saw a deadline
    // (it answers "no deadline set" otherwise)
    let reply = client
        .greet_slowly(
            CallOptions::new().with_timeout(Duration::from_secs(5)),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("call succeeds");
    assert!(reply.error().is_none());
    assert_eq!(
        reply.value().map(|value| value.message.as_str()),
        Some("hello world")
    );

    let reply = client
        .greet_slowly(
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert_eq!(reply.error().map(|e| e.message()), Some("no deadline set"));
}

#[tokio::test]
async fn a_slow_call_does_not_delay_an_independent_one() {
    let address = start_server().await;
    let client = GreeterClient::connect(address, pool_configuration())
        .await
        .expect("connect");

    let slow_request = GreetRequest {
        name: "slow".to_string(),
    };
    let fast_request = GreetRequest {
        name: "fast".to_string(),
    };
    let slow = client.greet_slowly(
        CallOptions::new().with_timeout(Duration::from_secs(5)),
        &slow_request,
    );
    let fast = async {
        let started = Instant::now();
        let reply = client
            .greet(CallOptions::new(), &fast_request)
            .await
            .expect("fast call succeeds");
        (reply, started.elapsed())
    };

    let (slow_reply, (fast_reply, fast_elapsed)) = tokio::join!(slow, fast);
    assert!(slow_reply.expect("slow call succeeds").error().is_none());
    assert!(fast_reply.error().is_none());
    // the fast call finished while the slow handler was still sleeping
    assert!(fast_elapsed < Duration::from_millis(150));
}

#[tokio::test]
async fn unknown_method_is_a_business_shaped_error() {
    let address = start_server().await;
    let client = RpcClient::connect(address, JsonSerializer, pool_configuration())
        .await
        .expect("connect");

    let reply: Reply<GreetResponse> = client
        .call(
            "greeter",
            "does_not_exist",
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert!(reply.value().is_none());
    assert!(reply
        .error()
        .map(|e| e.message().contains("method not found"))
        .unwrap_or(false));
}

#[tokio::test]
async fn unknown_service_is_a_business_shaped_error() {
    let address = start_server().await;
    let client = RpcClient::connect(address, JsonSerializer, pool_configuration())
        .await
        .expect("connect");

    let reply: Reply<GreetResponse> = client
        .call(
            "nobody-home",
            "greet",
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert!(reply
        .error()
        .map(|e| e.message().contains("service not found"))
        .unwrap_or(false));
}

/// Json bytes under a code the server never registered.
#[derive(Debug, Default, Clone, Copy)]
struct UnregisteredEncoding;

impl Encoding for UnregisteredEncoding {
    fn code(&self) -> u8 {
        42
    }
}

impl<T> Serializer<T> for UnregisteredEncoding
where
    T: Serialize + serde::de::DeserializeOwned,
{
    fn encode(&self, value: &T) -> wirecall::Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> wirecall::Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(Box::new(e)))
    }
}

#[tokio::test]
async fn unknown_serializer_code_is_a_business_shaped_error() {
    let address = start_server().await;
    let client = RpcClient::connect(address, UnregisteredEncoding, pool_configuration())
        .await
        .expect("connect");

    let reply: Reply<GreetResponse> = client
        .call(
            "greeter",
            "greet",
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await
        .expect("transport succeeds");
    assert!(reply
        .error()
        .map(|e| e.message().contains("unsupported serializer code"))
        .unwrap_or(false));
}

#[tokio::test]
async fn clean_exchanges_pool_the_connection_and_oneway_discards_it() {
    let address = start_server().await;
    let client = RpcClient::connect(address, JsonSerializer, pool_configuration())
        .await
        .expect("connect");
    let request = GreetRequest {
        name: "world".to_string(),
    };

    let _: Reply<GreetResponse> = client
        .call("greeter", "greet", CallOptions::new(), &request)
        .await
        .expect("call succeeds");
    assert_eq!(client.pool().idle_connections(), 1);

    let result: wirecall::Result<Reply<GreetResponse>> = client
        .call("greeter", "greet", CallOptions::new().oneway(), &request)
        .await;
    assert!(matches!(result, Err(Error::OnewayResult)));
    // the oneway connection went down instead of back to the idle set; the
    // server's unread reply must never reach a later call
    assert_eq!(client.pool().idle_connections(), 0);
}

#[tokio::test]
async fn separator_bytes_in_names_are_rejected_before_the_wire() {
    let address = start_server().await;
    let client = RpcClient::connect(address, JsonSerializer, pool_configuration())
        .await
        .expect("connect");

    let result: wirecall::Result<Reply<GreetResponse>> = client
        .call(
            "greeter",
            "greet\nextra",
            CallOptions::new(),
            &GreetRequest {
                name: "world".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
}
