//! Utilities for handling surfaces and their buffers
//!
//! This module provides automatic handling of the `wl_surface` lifecycle, by registering an
//! implementation for the [`wl_compositor`](wayland_server::protocol::wl_compositor) global. Every
//! `wl_surface` created by a client is backed by a [`Surface`] of the
//! [`surface`](crate::surface) module, stored in its user data.
//!
//! Buffers attached by clients are handed to the surface as [`WlClientBuffer`]s. This module does
//! not know about any buffer type, your [`CompositorHandler::buffer_metadata`] implementation
//! describes them (typically by looking at the shm or dmabuf user data of the `wl_buffer`).
//!
//! ## How to use it
//!
//! ```no_run
//! # extern crate wayland_server;
//! use wlframe::delegate_compositor;
//! use wlframe::surface::{BufferMetadata, SurfaceConfig};
//! use wlframe::wayland::compositor::{CompositorHandler, CompositorState};
//! use wayland_server::protocol::wl_buffer::WlBuffer;
//!
//! # struct State { compositor_state: CompositorState }
//! # let mut display = wayland_server::Display::<State>::new().unwrap();
//! // Create the compositor state
//! let compositor_state = CompositorState::new::<State>(
//!     &display.handle(),
//!     SurfaceConfig::default(),
//! ).expect("monotonic clock unavailable");
//!
//! // insert the CompositorState into your state
//! // ..
//!
//! // implement the necessary traits
//! impl CompositorHandler for State {
//!     fn compositor_state(&mut self) -> &mut CompositorState {
//!         &mut self.compositor_state
//!     }
//!
//!     fn buffer_metadata(&mut self, buffer: &WlBuffer) -> Option<BufferMetadata> {
//!         # let _ = buffer;
//!         // look up the size and kind of this buffer
//!         # None
//!     }
//! }
//! delegate_compositor!(State);
//!
//! // You're now ready to go!
//! ```
//!
//! Once your renderer presented the content of a surface, call [`send_frame_callback`] to fire the
//! frame callbacks of the client and advance its buffer queue.
//!
//! All hooks of [`CompositorHandler`] are called while the surface is locked. Calling the helpers
//! of this module for the same surface from within a hook will deadlock.

use std::sync::Mutex;

use tracing::trace;
use wayland_server::{
    backend::GlobalId,
    protocol::{wl_buffer::WlBuffer, wl_callback::WlCallback, wl_compositor::WlCompositor, wl_surface::WlSurface},
    DisplayHandle, GlobalDispatch, Resource,
};

use crate::{
    surface::{
        BufferKind, BufferMetadata, ClientBuffer, FrameCallback, PostError, ScanoutLease, Surface,
        SurfaceConfig, SurfaceEvent, SurfaceHandler, SurfaceId, TextureId,
    },
    utils::{Buffer, Clock, DeadResource, Monotonic, Size},
};

mod handlers;
#[cfg(test)]
mod tests;

/// Version of the advertised `wl_compositor` global
pub const COMPOSITOR_VERSION: u32 = 4;

/// Protocol error posted on a `wl_surface` attaching a buffer the compositor cannot use
pub const ERROR_UNSUPPORTED_BUFFER: u32 = 100;
/// Protocol error posted on a `wl_surface` attaching more buffers than it can hold
pub const ERROR_POOL_EXHAUSTED: u32 = 101;

/// A `wl_buffer` attached to a surface
#[derive(Debug, Clone)]
pub struct WlClientBuffer {
    buffer: WlBuffer,
    metadata: BufferMetadata,
}

impl WlClientBuffer {
    /// Wrap a `wl_buffer` described by `metadata`
    pub fn new(buffer: WlBuffer, metadata: BufferMetadata) -> Self {
        WlClientBuffer { buffer, metadata }
    }

    /// The underlying `wl_buffer`
    pub fn buffer(&self) -> &WlBuffer {
        &self.buffer
    }

    /// Description of the buffer
    pub fn metadata(&self) -> BufferMetadata {
        self.metadata
    }
}

impl PartialEq for WlClientBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

impl PartialEq<WlBuffer> for WlClientBuffer {
    fn eq(&self, other: &WlBuffer) -> bool {
        self.buffer == *other
    }
}

impl ClientBuffer for WlClientBuffer {
    fn size(&self) -> Size<i32, Buffer> {
        self.metadata.size
    }

    fn kind(&self) -> BufferKind {
        self.metadata.kind
    }

    fn release(&self) {
        if self.buffer.is_alive() {
            self.buffer.release();
        }
    }

    fn is_alive(&self) -> bool {
        self.buffer.is_alive()
    }
}

impl FrameCallback for WlCallback {
    fn fire(self, time: u32) {
        self.done(time);
    }
}

/// A surface as managed by this module
pub type WlSurfaceState = Surface<WlClientBuffer, WlCallback>;

/// User data of a `wl_surface`
#[derive(Debug)]
pub struct SurfaceUserData {
    pub(crate) inner: Mutex<WlSurfaceState>,
}

impl SurfaceUserData {
    pub(crate) fn new(config: SurfaceConfig) -> Self {
        SurfaceUserData {
            inner: Mutex::new(Surface::new(config)),
        }
    }
}

/// State of the compositor module
#[derive(Debug)]
pub struct CompositorState {
    global: GlobalId,
    clock: Clock<Monotonic>,
    config: SurfaceConfig,
}

impl CompositorState {
    /// Create a new `wl_compositor` global
    ///
    /// Every surface created through it uses `config`. Fails if the monotonic clock used for frame
    /// callback timestamps is unavailable.
    pub fn new<D>(display: &DisplayHandle, config: SurfaceConfig) -> std::io::Result<Self>
    where
        D: GlobalDispatch<WlCompositor, ()> + 'static,
    {
        let clock = Clock::new()?;
        let global = display.create_global::<D, WlCompositor, ()>(COMPOSITOR_VERSION, ());
        Ok(CompositorState { global, clock, config })
    }

    /// Get the id of the `wl_compositor` global
    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }

    /// Configuration of newly created surfaces
    pub fn config(&self) -> SurfaceConfig {
        self.config
    }

    /// Change the configuration of surfaces created from now on
    pub fn set_config(&mut self, config: SurfaceConfig) {
        self.config = config;
    }

    /// Current frame callback timestamp, in milliseconds
    pub fn frame_time(&self) -> u32 {
        self.clock.now().as_millis()
    }
}

/// Handler for the surface lifecycle
///
/// Every hook but [`compositor_state`](CompositorHandler::compositor_state) and
/// [`buffer_metadata`](CompositorHandler::buffer_metadata) has a default implementation, fitting a
/// compositor drawing every surface with its renderer.
pub trait CompositorHandler {
    /// [CompositorState] getter
    fn compositor_state(&mut self) -> &mut CompositorState;

    /// Describe a buffer attached by a client
    ///
    /// Returning `None` is a protocol error of the client.
    fn buffer_metadata(&mut self, buffer: &WlBuffer) -> Option<BufferMetadata>;

    /// Timestamp sent with frame callbacks
    fn frame_time(&mut self) -> u32 {
        self.compositor_state().frame_time()
    }

    /// A surface changed state
    fn surface_event(&mut self, surface: &WlSurface, event: SurfaceEvent) {
        let _ = (surface, event);
    }

    /// A surface has new content to be rendered
    fn mark_surface_dirty(&mut self, surface: &WlSurface) {
        let _ = surface;
    }

    /// A surface is about to be destroyed
    fn surface_destroyed(&mut self, surface: &WlSurface) {
        let _ = surface;
    }

    /// The renderer finished drawing a surface
    fn frame_finished(&mut self, surface: &WlSurface) {
        let _ = surface;
    }

    /// Whether buffers of this surface should be posted to display hardware directly
    fn is_direct_scanout(&mut self, surface: &WlSurface) -> bool {
        let _ = surface;
        false
    }

    /// Post a buffer of a surface to display hardware
    fn post_buffer(&mut self, surface: &WlSurface, lease: ScanoutLease<WlClientBuffer>) -> Result<(), PostError> {
        let _ = (surface, lease);
        Err(PostError::Unsupported)
    }

    /// Whether a hardware buffer has its origin in the bottom-left corner
    fn is_y_inverted(&mut self, buffer: &WlBuffer) -> bool {
        let _ = buffer;
        false
    }

    /// Create a renderer texture for a hardware buffer
    fn create_texture(&mut self, buffer: &WlBuffer) -> Option<TextureId> {
        let _ = buffer;
        None
    }
}

/// Routes the hooks of a [`Surface`] to the [`CompositorHandler`] with the `wl_surface` at hand
pub(crate) struct Hooks<'a, D> {
    pub(crate) state: &'a mut D,
    pub(crate) surface: &'a WlSurface,
}

impl<D: CompositorHandler> SurfaceHandler<WlClientBuffer> for Hooks<'_, D> {
    fn frame_time(&mut self) -> u32 {
        self.state.frame_time()
    }

    fn surface_destroyed(&mut self, _surface: SurfaceId) {
        self.state.surface_destroyed(self.surface);
    }

    fn mark_surface_dirty(&mut self, _surface: SurfaceId) {
        self.state.mark_surface_dirty(self.surface);
    }

    fn frame_finished(&mut self, _surface: SurfaceId) {
        self.state.frame_finished(self.surface);
    }

    fn surface_event(&mut self, _surface: SurfaceId, event: SurfaceEvent) {
        self.state.surface_event(self.surface, event);
    }

    fn is_direct_scanout(&mut self, _surface: SurfaceId) -> bool {
        self.state.is_direct_scanout(self.surface)
    }

    fn post_buffer(&mut self, _surface: SurfaceId, lease: ScanoutLease<WlClientBuffer>) -> Result<(), PostError> {
        self.state.post_buffer(self.surface, lease)
    }

    fn is_y_inverted(&mut self, buffer: &WlClientBuffer) -> bool {
        self.state.is_y_inverted(buffer.buffer())
    }

    fn create_texture(&mut self, buffer: &WlClientBuffer) -> Option<TextureId> {
        self.state.create_texture(buffer.buffer())
    }
}

/// Access the [`Surface`] backing a `wl_surface`
///
/// Fails if the `wl_surface` is dead or not managed by this module.
pub fn with_surface<T, F>(surface: &WlSurface, f: F) -> Result<T, DeadResource>
where
    F: FnOnce(&mut WlSurfaceState) -> T,
{
    let data = surface.data::<SurfaceUserData>().ok_or(DeadResource)?;
    let mut inner = data.inner.lock().unwrap();
    Ok(f(&mut inner))
}

fn with_hooks<D, T, F>(state: &mut D, surface: &WlSurface, f: F) -> Result<T, DeadResource>
where
    D: CompositorHandler,
    F: FnOnce(&mut WlSurfaceState, &mut Hooks<'_, D>) -> T,
{
    let data = surface.data::<SurfaceUserData>().ok_or(DeadResource)?;
    let mut inner = data.inner.lock().unwrap();
    Ok(f(&mut inner, &mut Hooks { state, surface }))
}

/// Signal that the content of a surface was presented
///
/// Fires its frame callbacks and advances its buffer queue.
pub fn send_frame_callback<D: CompositorHandler>(state: &mut D, surface: &WlSurface) -> Result<(), DeadResource> {
    with_hooks(state, surface, |inner, hooks| inner.send_frame_callback(hooks))
}

/// Signal that the renderer finished drawing a surface
pub fn frame_finished<D: CompositorHandler>(state: &mut D, surface: &WlSurface) -> Result<(), DeadResource> {
    with_hooks(state, surface, |inner, hooks| inner.frame_finished(hooks))
}

/// Whether the current content of a surface has its origin in the bottom-left corner
pub fn is_y_inverted<D: CompositorHandler>(state: &mut D, surface: &WlSurface) -> Result<bool, DeadResource> {
    with_hooks(state, surface, |inner, hooks| inner.is_y_inverted(hooks))
}

/// Renderer texture of the current content of a surface, created on first use
pub fn texture<D: CompositorHandler>(
    state: &mut D,
    surface: &WlSurface,
) -> Result<Option<TextureId>, DeadResource> {
    with_hooks(state, surface, |inner, hooks| inner.texture(hooks))
}

/// Signal that a client destroyed a `wl_buffer` possibly attached to a surface
pub fn buffer_destroyed(surface: &WlSurface, buffer: &WlBuffer) -> Result<(), DeadResource> {
    trace!(surface = ?surface.id(), buffer = ?buffer.id(), "Buffer destroyed");
    with_surface(surface, |inner| inner.buffer_destroyed(buffer))
}

/// Macro to delegate implementation of the wl_compositor to [`CompositorState`].
///
/// You must also implement [`CompositorHandler`] to use this.
#[macro_export]
macro_rules! delegate_compositor {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_compositor::WlCompositor: ()
        ] => $crate::wayland::compositor::CompositorState);

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_compositor::WlCompositor: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_surface::WlSurface: $crate::wayland::compositor::SurfaceUserData
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_region::WlRegion: ()
        ] => $crate::wayland::compositor::CompositorState);
        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_callback::WlCallback: ()
        ] => $crate::wayland::compositor::CompositorState);
    };
}
