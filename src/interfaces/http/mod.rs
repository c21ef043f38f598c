//! JSON-over-HTTP surface served with `actix-web`.

pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::configure_routes;
pub use state::AppState;
