pub mod config;
pub mod err;
pub mod mems;
pub mod reader;
pub mod value;

pub use err::*;
pub use mems::*;
pub use reader::*;
pub use value::*;
