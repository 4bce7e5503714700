/// Manifest elements and their resolved instances.
pub mod element;
pub mod manager;
/// Manifest document model.
pub mod model;
pub mod props;
/// Track-model collaborator and the shared image cache.
pub mod track_model;
