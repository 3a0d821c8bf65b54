//! Reexports of crates, that are part of the public api, for convenience

#[cfg(feature = "wayland_frontend")]
pub use wayland_server;
