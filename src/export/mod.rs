//! Surface serialization and the handles that own exported images.

/// Blob store and revocable export handles.
pub mod blob;
/// PNG serialization.
pub mod png;
