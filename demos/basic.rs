//! Minimal inbound example: echo what the reader makes of each request.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/whoami -u alice:secret
//!   curl http://localhost:3000/whoami -H 'x-forwarded-for: 1.2.3.4' -A Googlebot
//!   curl -X POST http://localhost:3000/echo/42 -d 'hello'

use http::Method;
use inbound::{ReaderConfig, Request, RequestReader, Router, Server};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    // RUST_LOG overrides; trust-boundary decisions log at debug.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inbound=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Trust the loopback proxy so the x-forwarded-for example above is honoured.
    let config = ReaderConfig::from_toml_str(r#"trusted_proxies = ["127.0.0.1", "::1"]"#)
        .expect("valid config");

    let app = Router::new()
        .on(Method::GET,  "/whoami",    whoami)
        .on(Method::POST, "/echo/{id}", echo);

    Server::bind("0.0.0.0:3000")
        .config(config)
        .serve(app)
        .await
        .expect("server error");
}

// GET /whoami
async fn whoami(req: Request) -> String {
    format!(
        "url: {}\nuser: {}\nclient: {}\ndevice: {}\nscript: {}\n",
        req.url(),
        req.user(),
        req.client_ip(),
        req.client_device_type_name(),
        req.script(false),
    )
}

// POST /echo/{id}
async fn echo(mut req: Request) -> Result<String, inbound::Error> {
    let route = req.route()?;
    let id = route.param("id").unwrap_or("unknown").to_owned();
    let body = req.content().await?;
    Ok(format!("{id}: {}\n", String::from_utf8_lossy(body)))
}
