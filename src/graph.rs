//! Microsoft Graph access: token acquisition, paginated reads and the payload
//! shapes the reports consume.
pub mod auth;
pub mod client;
pub mod error;
pub mod model;

pub use auth::{Authenticator, Credentials};
pub use client::{DEFAULT_GRAPH_URL, GraphClient};
pub use error::{GraphError, GraphResult};
