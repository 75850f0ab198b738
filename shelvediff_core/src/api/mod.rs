//! Data models shared by the engine, its backends and its front ends.
//!
//! Everything here is plain data: serializable with `serde` and free of
//! references to backend state.

pub use shelvediff_api::*;
