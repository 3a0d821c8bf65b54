//! Protocol-related utilities
//!
//! This module contains the handlers binding the protocol independent [`surface`](crate::surface)
//! and [`output`](crate::output) modules to wayland clients.
//!
//! Both modules work in the same way:
//!
//! - A state struct or method creates the global, given the [`DisplayHandle`](wayland_server::DisplayHandle)
//!   of your display.
//! - A handler trait is implemented by your compositor state, to be notified of the relevant events.
//! - A `delegate_*!` macro implements the `wayland-server` dispatching traits for your compositor
//!   state, forwarding them to the module.
//!
//! Wire transport (sockets and the event loop driving the [`Display`](wayland_server::Display)) is
//! left to the compositor.

pub mod compositor;
pub mod output;
