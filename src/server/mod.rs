pub mod route_builder;

pub use route_builder::{build_app, build_router, build_state};
