// ── Device sessions ──

mod context;
pub mod setup;

pub use context::DeviceContext;
pub use setup::{Established, Transports, establish};
