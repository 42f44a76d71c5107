// proxy module - prefix-based dev reverse proxy

pub mod config;
pub mod handler;
pub mod middleware;
pub mod rules;
pub mod server;
pub mod upstream;

pub use config::ServerConfig;
pub use rules::{ForwardSpec, PathRewrite, ProxyRule, RuleSet};
pub use server::DevServer;
