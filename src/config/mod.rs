pub mod field;
pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod resolver;

pub use field::*;
pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
pub use resolver::*;
