// thola-transport: device-facing sessions for the thola engine (SNMP + HTTP)

pub mod error;
pub mod http;
pub mod oid;
pub mod snmp;

pub use error::{Error, ProbeAttempt};
pub use oid::Oid;
