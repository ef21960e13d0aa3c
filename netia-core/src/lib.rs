pub mod config;
pub mod error;
pub mod error_utils;
pub mod platform;
pub mod store;
pub mod throttle;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use platform::PlatformClient;
pub use store::BotStore;
pub use throttle::RequestThrottle;
pub use types::*;
