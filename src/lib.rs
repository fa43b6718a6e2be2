//! # inbound
//!
//! A read-only view over one inbound HTTP request, for services behind a
//! reverse proxy.
//!
//! ## The contract
//!
//! The proxy terminates TLS, appends `X-Forwarded-For`, and rewrites `Host`.
//! By the time a request reaches your code, half of what it says about itself
//! is second-hand. inbound reconciles it once, at construction, into a single
//! [`RequestReader`]:
//!
//! - **Client address**: forwarding headers are honoured only from configured
//!   [trusted proxies](TrustedProxies); everyone else is reported as the peer.
//! - **Scheme and host**: from the connection, or from `X-Forwarded-Proto` /
//!   `X-Forwarded-Host` sent by a trusted proxy.
//! - **Path**: percent-decoded, with malformed escapes rejected up front.
//! - **Credentials**: HTTP Basic user and password, empty when absent.
//! - **Device type**: bot, console, tablet, mobile or pc, from the user agent.
//! - **Body**: read lazily, exactly once, bounded by a size limit, cached.
//!
//! Accessors never fail: absent data reads as `""` or `0`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use http::Method;
//! use inbound::{ReaderConfig, Request, RequestReader, Router, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ReaderConfig::from_toml_str(r#"trusted_proxies = ["10.0.0.0/8"]"#).unwrap();
//!
//!     let app = Router::new()
//!         .on(Method::GET,  "/whoami",     whoami)
//!         .on(Method::POST, "/users/{id}", update_user);
//!
//!     Server::bind("0.0.0.0:3000").config(config).serve(app).await.unwrap();
//! }
//!
//! async fn whoami(req: Request) -> String {
//!     format!("{} from {} on a {}", req.user(), req.client_ip(), req.client_device_type_name())
//! }
//!
//! async fn update_user(mut req: Request) -> Result<String, inbound::Error> {
//!     let id = req.route()?.param("id").unwrap_or_default().to_owned();
//!     let body = req.content().await?;
//!     Ok(format!("user {id}: {} bytes", body.len()))
//! }
//! ```
//!
//! Outside a server, build a reader directly from an `http::Request`
//! ([`HttpRequestReader`]) or from CGI meta-variables ([`CgiRequestReader`]).

mod auth;
mod body;
mod cgi;
mod config;
mod device;
mod env;
mod error;
mod handler;
mod http_reader;
mod parts;
mod proxy;
mod reader;
mod response;
mod router;
mod server;

pub use cgi::{CgiEnv, CgiRequestReader};
pub use config::{ConfigError, DEFAULT_MAX_BODY_SIZE, ForwardingHeaders, ReaderConfig};
pub use device::DeviceType;
pub use env::ServerEnv;
pub use error::Error;
pub use handler::Handler;
pub use http_reader::{ConnectionInfo, HttpRequestReader, Request};
pub use parts::{RawHead, RequestParts, Scheme, protocol_name};
pub use proxy::{ForwardedPosition, InvalidIpRange, IpRange, TrustedProxies};
pub use reader::RequestReader;
pub use response::{IntoResponse, Response};
pub use router::{Route, Router};
pub use server::Server;
