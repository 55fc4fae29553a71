use std::time::Duration;

use messages::{GreetRequest, GreetResponse};
use wirecall::client::{PoolConfiguration, RpcClient};
use wirecall::{CallOptions, Reply};
use wirecall_json::JsonSerializer;

mod messages;

/// One async method per remote method: call sites read like local calls and
/// never see frames, pools, or serializer codes.
struct GreeterClient {
    inner: RpcClient<JsonSerializer>,
}

impl GreeterClient {
    async fn connect(address: String) -> wirecall::Result<Self> {
        Ok(Self {
            inner: RpcClient::connect(address, JsonSerializer, PoolConfiguration::default())
                .await?,
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
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let address = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
    let client = GreeterClient::connect(address).await?;

    let request = GreetRequest {
        name: "world".to_string(),
    };

    let reply = client
        .greet(
            CallOptions::new().with_timeout(Duration::from_secs(2)),
            &request,
        )
        .await?;
    log::info!("greet replied: {:?}", reply.value());

    let reply = client.grumble(CallOptions::new(), &request).await?;
    log::info!(
        "grumble replied with value {:?} and error {:?}",
        reply.value(),
        reply.error()
    );

    // fire and forget: always answered locally with the fixed oneway error
    let result = client.greet(CallOptions::new().oneway(), &request).await;
    log::info!("oneway greet returned: {result:?}");

    Ok(())
}
