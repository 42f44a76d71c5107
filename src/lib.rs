pub mod config;
pub mod error;
pub mod logger;
pub mod proxy;

pub use config::{load_config, AppConfig};
pub use error::{AppError, AppResult};
pub use proxy::server::DevServer;
