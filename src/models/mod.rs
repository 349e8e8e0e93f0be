pub mod tag;
pub mod target;

pub use tag::*;
pub use target::*;
