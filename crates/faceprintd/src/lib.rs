//! faceprintd: REST daemon for face profile enrollment and verification.
//!
//! Face models are owned by a dedicated engine thread ([`engine`]); HTTP
//! handlers reach it through a cloneable [`engine::EngineHandle`] and
//! persist profiles through [`faceprint_store::ProfileStore`].

pub mod config;
pub mod engine;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use config::Config;
pub use engine::{spawn_engine, EngineError, EngineHandle};
pub use error::{ApiError, ApiResult};
pub use server::{build_router, serve};
pub use state::AppState;
