//! HTTP-facing commands
//!
//! Each command takes the shared [`AppState`](crate::AppState) plus a decoded
//! request and returns a serializable response. Transport lives in `server`.

pub mod runners;
pub mod version;
