pub mod memory;
pub mod project_file;
pub mod traits;

pub use memory::*;
pub use project_file::*;
pub use traits::*;
