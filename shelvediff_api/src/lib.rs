//! Shared shelvediff data models consumed by the core library and host adapters.

pub mod change;
pub mod comparison;
pub mod shelveset;
pub mod tool;

pub use change::*;
pub use comparison::*;
pub use shelveset::*;
pub use tool::*;
