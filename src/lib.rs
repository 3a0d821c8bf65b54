#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # wlframe: surface and buffer lifecycle for wayland compositors
//!
//! This crate implements the part of a wayland compositor tracking what clients have drawn: it
//! queues the buffers clients attach to their surfaces, decides when a new buffer can be shown,
//! releases buffers back to clients once they are no longer needed and fires frame callbacks once
//! a frame was actually presented.
//!
//! ## Structure of the crate
//!
//! - [`surface`] contains the protocol independent core: [`Surface`](surface::Surface), its
//!   [`BufferPool`](surface::BufferPool) and the [`SurfaceHandler`](surface::SurfaceHandler)
//!   trait through which a surface talks to your compositor.
//! - [`output`] describes the displays of your compositor, used to lay out surfaces.
//! - [`wayland`] (feature `wayland_frontend`, enabled by default) binds both to wayland clients
//!   through [`wayland-server`](wayland_server).
//!
//! ## General principles
//!
//! ### Single threaded state
//!
//! Every operation of a [`Surface`](surface::Surface) is expected to be called from the thread
//! running your wayland event loop. Operations that may need to notify your compositor take a
//! mutable reference to your [`SurfaceHandler`](surface::SurfaceHandler), there is no callback
//! registration and no shared ownership of your state.
//!
//! The one exception are buffers posted to display hardware: those are handed out as
//! [`ScanoutLease`](surface::ScanoutLease)s, which may be dropped from anywhere and at any time.
//!
//! ### Logging
//!
//! wlframe makes extensive use of [`tracing`] for its internal logging.
//!
//! For release builds it is recommended to limit the log level during compile time.
//! This can be done by adding a dependency to [`tracing`] and enabling the corresponding features.
//! For example to enable `trace` messages for debug builds, but limit release builds to `debug` add
//! the following in your binary crate `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```
//!
//! If you do not want to use [`tracing`] for your compositor, refer to [`log compatibility`](tracing#log-compatibility)
//! for how to forward wlframe's debug output to other `log` compatible frameworks.

pub mod output;
pub mod surface;
pub mod utils;
#[cfg(feature = "wayland_frontend")]
pub mod wayland;

pub mod reexports;
