pub mod channel;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod render;

pub use channel::{Channel, ConnectionError, Endpoint};
pub use config::DashboardConfig;
pub use dashboard::{attach, Dashboard};
pub use display::{MemorySurface, Surface};
