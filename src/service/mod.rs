//! Records, queries, and generic CRUD over the resolved schema.

mod crud;
mod query;
mod record;
mod validation;
pub use crud::{CrudService, Ids};
pub use query::{Cursor, Query, SelectSql};
pub use record::{Record, Slot};
pub use validation::RequestValidator;
