//! roost: declarative entities compiled to relational tables, served over a REST dispatcher.

pub mod case;
pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_app_config, load_schema, AppConfig, Entity, EntityDecl, Field, Schema, SchemaBuilder};
pub use error::{AppError, ConfigError, RouteError, SchemaError};
pub use handlers::{handler_fn, optimize, Handler, HandlerRef, Request};
pub use migration::{create_tables, ensure_tables};
pub use response::{success_many, success_one, success_one_ok, Reply};
pub use routes::{app, common_routes, EntryPoint, PathTree};
pub use service::{CrudService, Query, Record};
pub use state::AppState;
pub use store::{Database, Executor, ResultSet};
