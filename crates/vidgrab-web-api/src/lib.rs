pub mod cleanup;
pub mod client;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod problem;
pub mod routes;
pub mod server;

pub use cleanup::CleanupService;
pub use client::ClientId;
pub use config::Config;
pub use problem::ProblemDetails;
