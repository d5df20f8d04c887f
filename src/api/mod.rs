//! HTTP API.
//!
//! JSON endpoints for the doctor dashboard and the patient app, plus two
//! server-sent event feeds: the global alert stream and the per-patient
//! notification stream. Routes are nested under `/api/`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod sse;
pub mod types;

pub use router::api_router;
pub use server::{start_server, ApiServer};
pub use types::ApiContext;
