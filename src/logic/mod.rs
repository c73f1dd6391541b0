pub mod declarative;
pub mod manager;
pub mod registry;
pub mod step;

pub use declarative::*;
pub use manager::*;
pub use registry::*;
pub use step::*;
