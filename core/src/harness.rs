//! Run snippets in isolation and capture what they did.

pub mod builtin;
pub mod executor;
pub mod process;
pub mod result;

pub use builtin::*;
pub use executor::*;
pub use process::*;
pub use result::*;
