//! SQL generation: identifiers from the resolved schema only, values as parameters.

mod builder;
pub mod condition;
pub mod ddl;
pub mod dialect;
pub mod params;
pub use builder::*;
pub use condition::*;
pub use ddl::*;
pub use dialect::*;
pub use params::*;
