pub mod auth;
pub mod config;
pub mod error;
pub mod listener;
pub mod processor;
pub mod rip_message;
pub mod route_sink;
pub mod route_table;
pub mod subnet;
pub mod validator;

pub use error::RipError;
pub use processor::Processor;
pub use route_sink::RouteSink;
pub use route_table::{RouteKey, RouteTable};
