//! Structured, dynamically typed configuration tree

mod tree;
mod value;

pub use tree::Config;
pub use value::AttrValue;
