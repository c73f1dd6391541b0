pub mod class_hierarchy;
pub mod common;
pub mod dto;
pub mod element;

pub use class_hierarchy::*;
pub use common::*;
pub use dto::*;
pub use element::*;
