// HTTP access boundary: composes verification, replay checking and storage per request.

pub mod handler;
pub mod state;
pub mod stats;

pub use handler::{router, GatewayServer};
pub use state::{AccessPolicy, AppState};
