use messages::{GreetRequest, GreetResponse};
use wirecall::server::{Server, ServiceHandler};
use wirecall::Reply;
use wirecall_json::JsonSerializer;

mod messages;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut greeter = ServiceHandler::new("greeter")?;
    greeter.register(
        "greet",
        JsonSerializer,
        |context: wirecall::CallContext, request: GreetRequest| async move {
            if context.is_oneway() {
                log::info!("oneway greeting for {}, nobody reads this reply", request.name);
            }
            Reply::ok(GreetResponse {
                message: format!("hello {}", request.name),
            })
        },
    )?;
    greeter.register(
        "grumble",
        JsonSerializer,
        |_context, request: GreetRequest| async move {
            Reply::partial(
                GreetResponse {
                    message: format!("fine, hello {}", request.name),
                },
                "greeted under protest",
            )
        },
    )?;

    let mut server = Server::new();
    server.register_service(greeter)?;

    let address = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    server.serve(&address).await?;
    Ok(())
}
