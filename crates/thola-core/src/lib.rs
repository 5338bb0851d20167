//! Monitoring engine between the device transports (`thola-transport`) and
//! the front ends (CLI, or any framing layer that speaks [`Request`] and
//! [`Response`]).
//!
//! - **[`ClassTree`]**: device classes loaded from YAML, arranged by
//!   path. [`ClassTree::identify`] descends from `generic` to the most
//!   specific class whose match condition holds.
//!
//! - **Readers** ([`reader`]) and **conditions** ([`condition`]): the
//!   declarative strategies a class uses to read properties, metrics and
//!   tables, and to decide whether it matches a device.
//!
//! - **[`communicator::Communicator`]**: per-request facade that assembles
//!   typed components from a class's readers, preferring code overrides
//!   registered for the class or one of its ancestors.
//!
//! - **[`CacheStore`]**: identify results and working credentials per
//!   address, backed by a JSON file, SQLite, Redis or nothing.
//!
//! - **[`Engine`]**: the request pipeline. Validates, merges credentials,
//!   sets up sessions, identifies, dispatches and records [`stats`].
//!   Check requests produce monitoring-plugin verdicts ([`check`]).

pub mod check;
pub mod class;
pub mod communicator;
pub mod condition;
pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod reader;
pub mod request;
pub mod stats;
pub mod store;
pub mod value;

pub use check::{CheckPlugin, CheckResponse, Status, Thresholds};
pub use class::{ClassTree, DeviceClass};
pub use config::EngineConfig;
pub use error::CoreError;
pub use request::{Engine, Request, RequestKind, Response};
pub use store::CacheStore;
pub use value::Value;
