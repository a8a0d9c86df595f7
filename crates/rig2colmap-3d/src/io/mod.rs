/// Colmap text manifests and database module.
pub mod colmap;
