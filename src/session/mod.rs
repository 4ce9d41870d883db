/// Generation parameters and session-wide options.
pub mod request;
/// Orchestration of the encode, rasterize, composite and export stages.
pub mod state;
