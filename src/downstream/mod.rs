//! Collaborators that reach the downstream table service: the shared HTTP
//! client, the resource directory, and the profile store.

pub mod client;
pub mod profile_store;
pub mod resource_directory;
