//! Surface and buffer lifecycle
//!
//! A [`Surface`] tracks what a client has drawn and decides when it can be shown. It is
//! independent of any protocol library: client buffers are anything implementing
//! [`ClientBuffer`], frame callbacks anything implementing [`FrameCallback`], and everything the
//! surface needs from (or wants to tell) the compositor goes through a [`SurfaceHandler`] passed to
//! the operations that may need it.
//!
//! ## Buffer flow
//!
//! Each surface owns a [`BufferPool`] of a fixed number of slots. Attaching a buffer binds a free
//! slot and appends it to the pending queue. Damage marks the most recently attached buffer as
//! ready, and the head of the queue is then promoted to *back buffer*. Once the compositor has
//! shown the current content it calls [`Surface::send_frame_callback`]: the back buffer becomes
//! the *front buffer*, the previous front buffer is released to the client, the queue advances and
//! every pending frame callback fires exactly once.
//!
//! ```
//! use wlframe::surface::{FrameCallback, Surface, SurfaceConfig, SurfaceHandler};
//! # use wlframe::surface::{BufferKind, ClientBuffer};
//! # use wlframe::utils::{Buffer, Rectangle, Size};
//! # #[derive(Debug, Clone, PartialEq)]
//! # struct MyBuffer;
//! # impl ClientBuffer for MyBuffer {
//! #     fn size(&self) -> Size<i32, Buffer> { (64, 64).into() }
//! #     fn kind(&self) -> BufferKind { BufferKind::Shm }
//! #     fn release(&self) {}
//! # }
//! # struct Callback;
//! # impl FrameCallback for Callback { fn fire(self, _time: u32) {} }
//!
//! struct Compositor;
//!
//! impl SurfaceHandler<MyBuffer> for Compositor {
//!     fn frame_time(&mut self) -> u32 {
//!         0
//!     }
//! }
//!
//! let mut compositor = Compositor;
//! let mut surface = Surface::<MyBuffer, Callback>::new(SurfaceConfig::default());
//!
//! surface.attach(Some(MyBuffer)).unwrap();
//! surface.damage(Rectangle::from_size((64, 64).into()), &mut compositor);
//! assert!(surface.is_mapped());
//!
//! surface.register_frame_callback(Callback);
//! // once the content was shown
//! surface.send_frame_callback(&mut compositor);
//! ```
//!
//! ## Direct scanout
//!
//! If [`SurfaceHandler::is_direct_scanout`] returns `true` for a surface, every update first tries
//! to hand the current buffer to the display hardware through [`SurfaceHandler::post_buffer`]. A
//! successful post presents the buffer right away. The slot stays reserved for as long as the
//! [`ScanoutLease`] given to the handler is alive. A failed post falls back to the renderer path.

use std::{collections::VecDeque, fmt};

use tracing::{debug, trace, trace_span, warn};

use crate::utils::{Logical, Point, Rectangle, Size};

mod buffer;
mod config;
pub mod facets;
mod pool;
mod scanout;

pub use self::buffer::{BufferFlags, BufferHandle, BufferKind, BufferMetadata, ClientBuffer, TextureId};
pub use self::config::{DamageMode, SurfaceConfig, DEFAULT_POOL_SIZE};
pub use self::facets::{ExtendedSurface, Facets, ShellSurface, ShellSurfaceKind, SubSurface};
pub use self::pool::BufferPool;
pub use self::scanout::ScanoutLease;

crate::utils::ids::id_allocator!(static SURFACE_IDS);

/// Unique identifier of a [`Surface`]
///
/// Identifiers are reused once the surface they belonged to was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(usize);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors of surface requests
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// Every slot of the buffer pool is in use
    #[error("the client attached more buffers than the surface can hold")]
    PoolExhausted,
    /// The surface was already destroyed
    #[error("the surface was destroyed")]
    Destroyed,
}

/// Errors of posting a buffer to display hardware
#[derive(Debug, thiserror::Error)]
pub enum PostError {
    /// The compositor does not scan out client buffers
    #[error("direct scanout is not supported")]
    Unsupported,
    /// The display hardware refused the buffer
    #[error("the display rejected the buffer")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Notifications emitted by a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface got content and should be shown
    Mapped,
    /// The client attached a null buffer, the surface should be hidden
    Unmapped,
    /// Part of the surface changed and has to be redrawn
    Damaged(Rectangle<i32, Logical>),
    /// The surface size changed
    SizeChanged(Size<i32, Logical>),
    /// The surface was moved
    PositionChanged(Point<i32, Logical>),
}

/// What the current content of a surface is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// A shared-memory buffer
    Shm,
    /// A hardware buffer, to be used as a texture
    Texture,
    /// Nothing to show
    Invalid,
}

/// A one-shot frame completion notification
pub trait FrameCallback {
    /// Notify the client, `time` being a millisecond timestamp
    fn fire(self, time: u32);
}

/// Compositor side of the surface lifecycle
///
/// Only [`frame_time`](SurfaceHandler::frame_time) is required, every other hook defaults to a
/// compositor rendering everything itself.
pub trait SurfaceHandler<B: ClientBuffer> {
    /// Current timestamp for frame callbacks, in milliseconds
    fn frame_time(&mut self) -> u32;

    /// A surface is about to be torn down
    ///
    /// Called before any of its buffers are released, drop any render-side reference here.
    fn surface_destroyed(&mut self, _surface: SurfaceId) {}

    /// A surface has new content and needs to be rendered
    fn mark_surface_dirty(&mut self, _surface: SurfaceId) {}

    /// The renderer finished drawing a surface
    fn frame_finished(&mut self, _surface: SurfaceId) {}

    /// A surface changed state
    fn surface_event(&mut self, _surface: SurfaceId, _event: SurfaceEvent) {}

    /// Whether buffers of this surface should be posted to display hardware directly
    fn is_direct_scanout(&mut self, _surface: SurfaceId) -> bool {
        false
    }

    /// Post a buffer to display hardware
    ///
    /// Keep the lease until the hardware stopped reading from the buffer.
    fn post_buffer(&mut self, _surface: SurfaceId, _lease: ScanoutLease<B>) -> Result<(), PostError> {
        Err(PostError::Unsupported)
    }

    /// Whether a hardware buffer has its origin in the bottom-left corner
    fn is_y_inverted(&mut self, _buffer: &B) -> bool {
        false
    }

    /// Create a renderer texture for a hardware buffer
    fn create_texture(&mut self, _buffer: &B) -> Option<TextureId> {
        None
    }
}

/// A client surface
#[derive(Debug)]
pub struct Surface<B: ClientBuffer, C> {
    id: SurfaceId,
    config: SurfaceConfig,
    pool: BufferPool<B>,
    queue: VecDeque<usize>,
    back: Option<usize>,
    front: Option<usize>,
    position: Point<i32, Logical>,
    size: Size<i32, Logical>,
    mapped: bool,
    destroyed: bool,
    frame_callbacks: Vec<C>,
    facets: Facets,
}

impl<B: ClientBuffer, C> Drop for Surface<B, C> {
    fn drop(&mut self) {
        if !self.destroyed {
            trace!(surface = %self.id, "Dropping surface without destroy");
            self.pool.disown_all();
        }
        SURFACE_IDS.lock().unwrap().release(self.id.0);
    }
}

impl<B: ClientBuffer, C: FrameCallback> Surface<B, C> {
    /// Create a new, unmapped surface
    pub fn new(config: SurfaceConfig) -> Self {
        let capacity = config.pool_size.get();
        Surface {
            id: SurfaceId(SURFACE_IDS.lock().unwrap().allocate()),
            config,
            pool: BufferPool::new(config.pool_size),
            queue: VecDeque::with_capacity(capacity),
            back: None,
            front: None,
            position: Point::default(),
            size: Size::default(),
            mapped: false,
            destroyed: false,
            frame_callbacks: Vec::new(),
            facets: Facets::default(),
        }
    }

    /// Identifier of this surface
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Configuration this surface was created with
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Attach a new buffer, `None` detaching the content
    ///
    /// Attaching the buffer the surface already holds last does nothing. An attach that was
    /// never damaged is replaced by the new one.
    pub fn attach(&mut self, buffer: Option<B>) -> Result<(), SurfaceError> {
        let _span = trace_span!("surface", id = %self.id).entered();
        if self.destroyed {
            return Err(SurfaceError::Destroyed);
        }

        if let Some(&tail) = self.queue.back() {
            if self.pool[tail].holds(buffer.as_ref()) {
                trace!(?buffer, "Buffer already queued");
                return Ok(());
            }
            if !self.pool[tail].has_valid_damage() {
                trace!(slot = tail, "Replacing undamaged attach");
                self.queue.pop_back();
                self.pool.disown(tail);
            }
        } else if let Some(current) = self.current_slot() {
            if self.pool[current].holds(buffer.as_ref()) {
                trace!(?buffer, "Buffer already current");
                return Ok(());
            }
        }

        let slot = self.pool.acquire().ok_or_else(|| {
            warn!(capacity = self.pool.capacity(), "Buffer pool exhausted");
            SurfaceError::PoolExhausted
        })?;
        trace!(slot, ?buffer, "Queueing buffer");
        self.pool[slot].initialize(buffer);
        self.queue.push_back(slot);
        debug_assert!(self.queue.len() <= self.pool.capacity());

        Ok(())
    }

    /// Mark part of the surface as changed
    ///
    /// The damage applies to the most recently attached buffer, or to the current one if
    /// nothing is queued. Without any buffer the damage is ignored.
    pub fn damage<H: SurfaceHandler<B>>(&mut self, damage: Rectangle<i32, Logical>, handler: &mut H) {
        let _span = trace_span!("surface", id = %self.id).entered();
        if self.destroyed {
            return;
        }

        let mode = self.config.damage_mode;
        if let Some(&tail) = self.queue.back() {
            self.pool[tail].set_damage(damage, mode);
            if self.back.is_none() {
                self.advance_buffer_queue(handler);
            }
        } else if let Some(current) = self.current_slot() {
            self.pool[current].set_damage(damage, mode);
        } else {
            trace!(?damage, "Ignoring damage without buffer");
            return;
        }

        self.update(handler);
    }

    /// Promote the head of the pending queue to back buffer
    ///
    /// Destroyed buffers are skipped. Returns whether a new back buffer is available.
    pub fn advance_buffer_queue<H: SurfaceHandler<B>>(&mut self, handler: &mut H) -> bool {
        if self.destroyed {
            return false;
        }

        let mut next = None;
        while let Some(slot) = self.queue.pop_front() {
            if self.pool[slot].is_destroyed() {
                trace!(slot, "Skipping destroyed buffer");
                self.pool.disown(slot);
                continue;
            }
            next = Some(slot);
            break;
        }
        let Some(back) = next else {
            return false;
        };
        if let Some(previous) = self.back.replace(back) {
            if Some(previous) != self.front {
                self.pool.disown(previous);
            }
        }

        let has_content = self.pool[back].has_content();
        if has_content {
            let size = self.pool[back].size().to_logical();
            self.set_size(size, handler);
        }

        let attached_to_parent = self
            .facets
            .get::<SubSurface>()
            .map_or(false, |sub| sub.parent.is_some());
        if has_content && !self.mapped && !attached_to_parent {
            debug!(surface = %self.id, "Surface mapped");
            self.mapped = true;
            handler.surface_event(self.id, SurfaceEvent::Mapped);
        } else if !has_content && self.mapped {
            debug!(surface = %self.id, "Surface unmapped");
            self.mapped = false;
            handler.surface_event(self.id, SurfaceEvent::Unmapped);
        }

        true
    }

    /// Register a callback for the next [`send_frame_callback`](Surface::send_frame_callback)
    pub fn register_frame_callback(&mut self, callback: C) {
        if self.destroyed {
            trace!(surface = %self.id, "Dropping frame callback of destroyed surface");
            return;
        }
        self.frame_callbacks.push(callback);
    }

    /// The compositor finished showing the current content
    ///
    /// Retires the previous front buffer, advances the queue and fires every pending frame
    /// callback in registration order.
    pub fn send_frame_callback<H: SurfaceHandler<B>>(&mut self, handler: &mut H) {
        let _span = trace_span!("surface", id = %self.id).entered();
        if self.destroyed {
            return;
        }

        if self.present(handler) {
            self.update(handler);
        }
    }

    /// The renderer finished drawing this surface
    pub fn frame_finished<H: SurfaceHandler<B>>(&self, handler: &mut H) {
        if !self.destroyed {
            handler.frame_finished(self.id);
        }
    }

    /// Tear down the surface
    ///
    /// The handler is notified first. Pending frame callbacks are dropped without firing and
    /// every buffer not held by display hardware is released.
    pub fn destroy<H: SurfaceHandler<B>>(&mut self, handler: &mut H) {
        if self.destroyed {
            return;
        }
        let _span = trace_span!("surface", id = %self.id).entered();
        debug!(
            queued = self.queue.len(),
            callbacks = self.frame_callbacks.len(),
            "Destroying surface"
        );

        handler.surface_destroyed(self.id);
        self.destroyed = true;
        self.mapped = false;
        self.frame_callbacks.clear();
        self.queue.clear();
        self.back = None;
        self.front = None;
        self.pool.disown_all();
    }

    /// Notify the surface that the client destroyed a buffer
    ///
    /// Destroyed buffers still waiting in the queue are skipped, and never released.
    pub fn buffer_destroyed<Q>(&mut self, buffer: &Q)
    where
        Q: fmt::Debug + ?Sized,
        B: PartialEq<Q>,
    {
        for slot in self.pool.iter_mut() {
            if slot.buffer().map_or(false, |held| held == buffer) {
                trace!(?buffer, "Buffer destroyed by client");
                slot.mark_destroyed();
            }
        }
    }

    /// Move the surface
    pub fn set_position<H: SurfaceHandler<B>>(&mut self, position: Point<i32, Logical>, handler: &mut H) {
        if self.position != position {
            self.position = position;
            handler.surface_event(self.id, SurfaceEvent::PositionChanged(position));
        }
    }

    /// Position of the surface
    pub fn position(&self) -> Point<i32, Logical> {
        self.position
    }

    /// Size of the most recently promoted buffer with content
    pub fn size(&self) -> Size<i32, Logical> {
        self.size
    }

    /// Whether the surface has content to be shown
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Whether the surface was destroyed
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// What the current content is made of
    pub fn content_kind(&self) -> ContentKind {
        match self.current_buffer().and_then(BufferHandle::kind) {
            Some(BufferKind::Shm) => ContentKind::Shm,
            Some(BufferKind::Hardware) => ContentKind::Texture,
            None => ContentKind::Invalid,
        }
    }

    /// Whether the current buffer has content
    pub fn is_visible(&self) -> bool {
        self.current_buffer().map_or(false, BufferHandle::has_content)
    }

    /// Whether the current content has its origin in the bottom-left corner
    ///
    /// Shared-memory content is always inverted, hardware buffers are asked about. The answer is
    /// flipped if [`SurfaceConfig::negate_y_inverted`] is set.
    pub fn is_y_inverted<H: SurfaceHandler<B>>(&self, handler: &mut H) -> bool {
        let inverted = match self.current_buffer() {
            None => false,
            Some(handle) => match handle.buffer() {
                Some(buffer) if buffer.kind() == BufferKind::Hardware => handler.is_y_inverted(buffer),
                _ => true,
            },
        };
        inverted != self.config.negate_y_inverted
    }

    /// Renderer texture of the current content
    ///
    /// Created through [`SurfaceHandler::create_texture`] on first use for hardware buffers.
    pub fn texture<H: SurfaceHandler<B>>(&mut self, handler: &mut H) -> Option<TextureId> {
        let slot = self.current_slot()?;
        let handle = &mut self.pool[slot];
        if handle.texture().is_none() && handle.kind() == Some(BufferKind::Hardware) && !handle.is_destroyed() {
            if let Some(texture) = handle.buffer().and_then(|buffer| handler.create_texture(buffer)) {
                trace!(surface = %self.id, ?texture, "Created texture");
                handle.set_texture(texture);
            }
        }
        handle.texture()
    }

    /// Number of attached buffers waiting for promotion
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Number of frame callbacks waiting to fire
    pub fn pending_frame_callbacks(&self) -> usize {
        self.frame_callbacks.len()
    }

    /// The buffer waiting to be shown
    pub fn back_buffer(&self) -> Option<&BufferHandle<B>> {
        self.back.map(|slot| &self.pool[slot])
    }

    /// The buffer shown last
    pub fn front_buffer(&self) -> Option<&BufferHandle<B>> {
        self.front.map(|slot| &self.pool[slot])
    }

    /// The back buffer, or the front buffer if there is none
    pub fn current_buffer(&self) -> Option<&BufferHandle<B>> {
        self.current_slot().map(|slot| &self.pool[slot])
    }

    /// The most recently attached buffer waiting for promotion
    pub fn queued_buffer(&self) -> Option<&BufferHandle<B>> {
        self.queue.back().map(|&slot| &self.pool[slot])
    }

    /// The buffer slots of this surface
    pub fn pool(&self) -> &BufferPool<B> {
        &self.pool
    }

    /// Optional capabilities of this surface
    pub fn facets(&self) -> &Facets {
        &self.facets
    }

    /// Mutable access to the optional capabilities of this surface
    pub fn facets_mut(&mut self) -> &mut Facets {
        &mut self.facets
    }

    /// The extended-surface facet
    pub fn extended_surface(&self) -> Option<&ExtendedSurface> {
        self.facets.get()
    }

    /// Mutable access to the extended-surface facet
    pub fn extended_surface_mut(&mut self) -> Option<&mut ExtendedSurface> {
        self.facets.get_mut()
    }

    /// The sub-surface facet
    pub fn sub_surface(&self) -> Option<&SubSurface> {
        self.facets.get()
    }

    /// Mutable access to the sub-surface facet
    pub fn sub_surface_mut(&mut self) -> Option<&mut SubSurface> {
        self.facets.get_mut()
    }

    /// The shell-surface facet
    pub fn shell_surface(&self) -> Option<&ShellSurface> {
        self.facets.get()
    }

    /// Mutable access to the shell-surface facet
    pub fn shell_surface_mut(&mut self) -> Option<&mut ShellSurface> {
        self.facets.get_mut()
    }

    fn current_slot(&self) -> Option<usize> {
        self.back.or(self.front)
    }

    fn set_size<H: SurfaceHandler<B>>(&mut self, size: Size<i32, Logical>, handler: &mut H) {
        if self.size != size {
            self.size = size;
            handler.surface_event(self.id, SurfaceEvent::SizeChanged(size));
        }
    }

    // returns whether a new back buffer became ready
    fn present<H: SurfaceHandler<B>>(&mut self, handler: &mut H) -> bool {
        if let Some(current) = self.current_slot() {
            self.pool[current].set_displayed();
        }
        if let Some(back) = self.back.take() {
            if let Some(previous) = self.front.replace(back) {
                if previous != back {
                    self.pool.disown(previous);
                }
            }
        }

        let update_needed = self.advance_buffer_queue(handler);

        let time = handler.frame_time();
        trace!(time, count = self.frame_callbacks.len(), "Firing frame callbacks");
        for callback in self.frame_callbacks.drain(..) {
            callback.fire(time);
        }

        update_needed
    }

    fn update<H: SurfaceHandler<B>>(&mut self, handler: &mut H) {
        loop {
            if !self.post_buffer(handler) {
                if let Some(damage) = self.current_buffer().and_then(BufferHandle::damage) {
                    handler.mark_surface_dirty(self.id);
                    handler.surface_event(self.id, SurfaceEvent::Damaged(damage));
                }
                return;
            }
            if !self.present(handler) {
                return;
            }
        }
    }

    fn post_buffer<H: SurfaceHandler<B>>(&mut self, handler: &mut H) -> bool {
        if !handler.is_direct_scanout(self.id) {
            return false;
        }
        let Some(lease) = self.current_slot().and_then(|slot| self.pool[slot].lease()) else {
            return false;
        };
        match handler.post_buffer(self.id, lease) {
            Ok(()) => {
                trace!("Posted buffer for direct scanout");
                true
            }
            Err(err) => {
                warn!(?err, "Could not post buffer, falling back to the renderer");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::surface::buffer::tests::TestBuffer;

    #[derive(Default)]
    struct Recorder {
        events: Vec<SurfaceEvent>,
        dirty: usize,
        direct: bool,
        leases: Vec<ScanoutLease<TestBuffer>>,
        hardware_inverted: bool,
        textures: u64,
    }

    impl SurfaceHandler<TestBuffer> for Recorder {
        fn frame_time(&mut self) -> u32 {
            42
        }

        fn mark_surface_dirty(&mut self, _surface: SurfaceId) {
            self.dirty += 1;
        }

        fn surface_event(&mut self, _surface: SurfaceId, event: SurfaceEvent) {
            self.events.push(event);
        }

        fn is_direct_scanout(&mut self, _surface: SurfaceId) -> bool {
            self.direct
        }

        fn post_buffer(&mut self, _surface: SurfaceId, lease: ScanoutLease<TestBuffer>) -> Result<(), PostError> {
            self.leases.push(lease);
            Ok(())
        }

        fn is_y_inverted(&mut self, _buffer: &TestBuffer) -> bool {
            self.hardware_inverted
        }

        fn create_texture(&mut self, _buffer: &TestBuffer) -> Option<TextureId> {
            self.textures += 1;
            Some(TextureId(self.textures))
        }
    }

    struct Callback(u32, Rc<RefCell<Vec<(u32, u32)>>>);

    impl FrameCallback for Callback {
        fn fire(self, time: u32) {
            self.1.borrow_mut().push((self.0, time));
        }
    }

    fn full(w: i32, h: i32) -> Rectangle<i32, Logical> {
        Rectangle::from_size((w, h).into())
    }

    #[test]
    fn reattach_current_buffer_is_noop() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let buffer = TestBuffer::new(10, 10);

        surface.attach(Some(buffer.clone())).unwrap();
        surface.damage(full(10, 10), &mut handler);
        assert_eq!(surface.queue_len(), 0);

        surface.attach(Some(buffer.clone())).unwrap();
        assert_eq!(surface.queue_len(), 0);
        assert_eq!(surface.pool().in_use(), 1);
    }

    #[test]
    fn sub_surface_with_parent_is_not_mapped() {
        let mut handler = Recorder::default();
        let mut parent = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let mut child = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        child.facets_mut().insert(SubSurface {
            parent: Some(parent.id()),
            ..Default::default()
        });

        child.attach(Some(TestBuffer::new(5, 5))).unwrap();
        child.damage(full(5, 5), &mut handler);
        assert!(!child.is_mapped());
        assert_eq!(child.size(), Size::new(5, 5));

        parent.attach(Some(TestBuffer::new(5, 5))).unwrap();
        parent.damage(full(5, 5), &mut handler);
        assert!(parent.is_mapped());
    }

    #[test]
    fn damage_marks_dirty() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());

        surface.damage(full(1, 1), &mut handler);
        assert_eq!(handler.dirty, 0);

        surface.attach(Some(TestBuffer::new(20, 20))).unwrap();
        surface.damage(Rectangle::new((2, 2).into(), (4, 4).into()), &mut handler);
        assert_eq!(handler.dirty, 1);
        assert_eq!(
            handler.events.last(),
            Some(&SurfaceEvent::Damaged(Rectangle::new((2, 2).into(), (4, 4).into())))
        );
    }

    #[test]
    fn direct_scanout_presents_immediately() {
        let mut handler = Recorder {
            direct: true,
            ..Default::default()
        };
        let fired = Rc::new(RefCell::new(Vec::new()));
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let first = TestBuffer::with_kind(8, 8, BufferKind::Hardware);
        let second = TestBuffer::with_kind(8, 8, BufferKind::Hardware);

        surface.register_frame_callback(Callback(1, fired.clone()));
        surface.attach(Some(first.clone())).unwrap();
        surface.damage(full(8, 8), &mut handler);

        assert_eq!(*fired.borrow(), vec![(1, 42)]);
        assert_eq!(handler.dirty, 0);
        assert!(surface.front_buffer().unwrap().is_displayed());
        assert!(surface.back_buffer().is_none());

        surface.attach(Some(second.clone())).unwrap();
        surface.damage(full(8, 8), &mut handler);
        // the first buffer is still scanned out
        assert_eq!(first.releases(), 0);
        assert_eq!(surface.pool().held_by_hardware(), 2);

        handler.leases.remove(0);
        assert_eq!(first.releases(), 1);
        assert_eq!(second.releases(), 0);
    }

    #[test]
    fn failed_post_falls_back_to_renderer() {
        struct Refusing(usize);
        impl SurfaceHandler<TestBuffer> for Refusing {
            fn frame_time(&mut self) -> u32 {
                0
            }
            fn mark_surface_dirty(&mut self, _surface: SurfaceId) {
                self.0 += 1;
            }
            fn is_direct_scanout(&mut self, _surface: SurfaceId) -> bool {
                true
            }
        }

        let mut handler = Refusing(0);
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        surface.attach(Some(TestBuffer::new(8, 8))).unwrap();
        surface.damage(full(8, 8), &mut handler);

        assert_eq!(handler.0, 1);
        assert_eq!(surface.pool().held_by_hardware(), 0);
        assert!(surface.front_buffer().is_none());
    }

    #[test]
    fn y_inversion() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        assert!(!surface.is_y_inverted(&mut handler));

        surface.attach(Some(TestBuffer::new(4, 4))).unwrap();
        surface.damage(full(4, 4), &mut handler);
        assert!(surface.is_y_inverted(&mut handler));

        let mut negated =
            Surface::<TestBuffer, Callback>::new(SurfaceConfig::default().with_negate_y_inverted(true));
        negated
            .attach(Some(TestBuffer::with_kind(4, 4, BufferKind::Hardware)))
            .unwrap();
        negated.damage(full(4, 4), &mut handler);
        assert!(negated.is_y_inverted(&mut handler));
        handler.hardware_inverted = true;
        assert!(!negated.is_y_inverted(&mut handler));
    }

    #[test]
    fn content_kind_and_texture() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        assert_eq!(surface.content_kind(), ContentKind::Invalid);
        assert!(!surface.is_visible());

        surface.attach(Some(TestBuffer::new(4, 4))).unwrap();
        surface.damage(full(4, 4), &mut handler);
        assert_eq!(surface.content_kind(), ContentKind::Shm);
        assert_eq!(surface.texture(&mut handler), None);

        surface.attach(Some(TestBuffer::with_kind(4, 4, BufferKind::Hardware))).unwrap();
        surface.damage(full(4, 4), &mut handler);
        surface.send_frame_callback(&mut handler);
        assert_eq!(surface.content_kind(), ContentKind::Texture);
        assert!(surface.is_visible());

        assert_eq!(surface.texture(&mut handler), Some(TextureId(1)));
        assert_eq!(surface.texture(&mut handler), Some(TextureId(1)));
        assert_eq!(handler.textures, 1);
    }

    #[test]
    fn position_events() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());

        surface.set_position((10, 20).into(), &mut handler);
        surface.set_position((10, 20).into(), &mut handler);
        assert_eq!(surface.position(), Point::new(10, 20));
        assert_eq!(handler.events, vec![SurfaceEvent::PositionChanged(Point::new(10, 20))]);
    }

    #[test]
    fn destroyed_queued_buffer_is_skipped() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let first = TestBuffer::new(4, 4);
        let second = TestBuffer::new(6, 6);

        surface.attach(Some(first.clone())).unwrap();
        surface.damage(full(4, 4), &mut handler);
        surface.attach(Some(second.clone())).unwrap();
        surface.damage(full(6, 6), &mut handler);
        assert_eq!(surface.queue_len(), 1);

        surface.buffer_destroyed(&second);
        surface.send_frame_callback(&mut handler);

        assert_eq!(surface.queue_len(), 0);
        assert!(surface.back_buffer().is_none());
        assert_eq!(surface.size(), Size::new(4, 4));
        assert_eq!(second.releases(), 0);
        assert_eq!(surface.pool().in_use(), 1);
    }

    #[test]
    fn reattached_back_buffer_stays_with_compositor() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let a = TestBuffer::new(4, 4);
        let c = TestBuffer::new(4, 4);

        for buffer in [&a, &c, &a] {
            surface.attach(Some(buffer.clone())).unwrap();
            surface.damage(full(4, 4), &mut handler);
        }
        surface.send_frame_callback(&mut handler);
        surface.send_frame_callback(&mut handler);

        assert!(surface.back_buffer().unwrap().holds(Some(&a)));
        assert_eq!(a.releases(), 0);

        surface.send_frame_callback(&mut handler);
        assert_eq!(c.releases(), 1);
        assert_eq!(a.releases(), 0);

        surface.destroy(&mut handler);
        assert_eq!(a.releases(), 1);
        assert_eq!(c.releases(), 1);
    }

    #[test]
    fn destroyed_buffer_is_rendered_instead_of_posted() {
        let mut handler = Recorder::default();
        let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
        let buffer = TestBuffer::with_kind(8, 8, BufferKind::Hardware);

        surface.attach(Some(buffer.clone())).unwrap();
        surface.damage(full(8, 8), &mut handler);
        assert_eq!(handler.dirty, 1);

        buffer.alive.set(false);
        handler.direct = true;
        surface.damage(full(8, 8), &mut handler);

        assert!(handler.leases.is_empty());
        assert_eq!(handler.dirty, 2);
        assert_eq!(surface.pool().held_by_hardware(), 0);
    }

    #[test]
    fn dropped_surface_releases_buffers() {
        let mut handler = Recorder {
            direct: true,
            ..Default::default()
        };
        let scanned_out = TestBuffer::with_kind(8, 8, BufferKind::Hardware);
        let queued = TestBuffer::new(8, 8);
        {
            let mut surface = Surface::<TestBuffer, Callback>::new(SurfaceConfig::default());
            surface.attach(Some(scanned_out.clone())).unwrap();
            surface.damage(full(8, 8), &mut handler);
            handler.direct = false;
            surface.attach(Some(queued.clone())).unwrap();
        }

        assert_eq!(queued.releases(), 1);
        assert_eq!(scanned_out.releases(), 0);
        handler.leases.clear();
        assert_eq!(scanned_out.releases(), 1);
    }
}
