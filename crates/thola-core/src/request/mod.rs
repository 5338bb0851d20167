pub mod pipeline;
pub mod types;
pub mod validate;

pub use pipeline::{Engine, EngineBuilder};
pub use types::{BaseRequest, DeviceData, Request, RequestKind, Response};
pub use validate::validate;
