use std::{fmt, sync::Arc};

use tracing::trace;

use super::{
    config::DamageMode,
    scanout::{ScanoutLease, ScanoutShared},
};
use crate::utils::{Buffer, Logical, Rectangle, Size};

/// Storage backing a client buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Pixels in memory shared with the client
    Shm,
    /// Hardware-backed buffer (dmabuf, EGL images, ...)
    Hardware,
}

/// Description of a client buffer, as provided by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMetadata {
    /// Dimensions of the buffer in pixels
    pub size: Size<i32, Buffer>,
    /// Storage of the buffer
    pub kind: BufferKind,
}

/// Identifier of a renderer-side texture created for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// A pixel buffer submitted by a client
///
/// The buffer stays owned by the client. The compositor may read it until it calls
/// [`ClientBuffer::release`], after which it must not touch it anymore.
pub trait ClientBuffer: Clone + PartialEq + fmt::Debug {
    /// Dimensions of the buffer
    fn size(&self) -> Size<i32, Buffer>;
    /// Storage of the buffer
    fn kind(&self) -> BufferKind;
    /// Hand the buffer back to the client
    fn release(&self);
    /// Whether the client still holds the buffer
    fn is_alive(&self) -> bool {
        true
    }
}

bitflags::bitflags! {
    /// State of a [`BufferHandle`]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u8 {
        /// The slot is bound to a client attach
        const REGISTERED = 1;
        /// The client destroyed the bound buffer
        const DESTROYED = 2;
        /// The bound buffer has been shown at least once
        const DISPLAYED = 4;
    }
}

/// A buffer pool slot
///
/// Wraps one attached client buffer (or a null attach) together with its damage and reference
/// state.
pub struct BufferHandle<B> {
    buffer: Option<B>,
    flags: BufferFlags,
    damage: Option<Rectangle<i32, Logical>>,
    size: Size<i32, Buffer>,
    texture: Option<TextureId>,
    scanout: Option<Arc<ScanoutShared>>,
}

impl<B> Default for BufferHandle<B> {
    fn default() -> Self {
        BufferHandle {
            buffer: None,
            flags: BufferFlags::empty(),
            damage: None,
            size: Size::default(),
            texture: None,
            scanout: None,
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for BufferHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("buffer", &self.buffer)
            .field("flags", &self.flags)
            .field("damage", &self.damage)
            .field("size", &self.size)
            .field("texture", &self.texture)
            .field("scanout", &self.scanout.as_ref().map(|s| s.holders()))
            .finish()
    }
}

impl<B: ClientBuffer> BufferHandle<B> {
    /// Bind this slot to a newly attached buffer, `None` being a null attach
    pub fn initialize(&mut self, buffer: Option<B>) {
        debug_assert!(self.is_free(), "initializing a slot that is still in use");
        self.size = buffer.as_ref().map(ClientBuffer::size).unwrap_or_default();
        self.buffer = buffer;
        self.flags = BufferFlags::REGISTERED;
        self.damage = None;
        self.texture = None;
        self.scanout = None;
    }

    /// Detach the slot from its client buffer, making it available for reuse
    ///
    /// The buffer is released to the client unless it was destroyed. If display hardware
    /// still holds the slot, the release happens when the last [`ScanoutLease`] is dropped.
    pub fn disown(&mut self) {
        if !self.flags.contains(BufferFlags::REGISTERED) {
            return;
        }

        let destroyed = self.is_destroyed();
        self.flags = BufferFlags::empty();
        self.damage = None;
        self.texture = None;

        let Some(buffer) = self.buffer.take() else {
            self.scanout = None;
            return;
        };

        match self.scanout.as_ref() {
            Some(shared) if shared.holders() > 0 => {
                if destroyed {
                    trace!(?buffer, "Disowning destroyed buffer held by hardware");
                } else if shared.defer_release() {
                    buffer.release();
                } else {
                    trace!(?buffer, "Buffer held by hardware, deferring release");
                }
            }
            _ => {
                self.scanout = None;
                if destroyed {
                    trace!(?buffer, "Dropping destroyed buffer");
                } else {
                    buffer.release();
                }
            }
        }
    }

    /// Free the slot without releasing the client buffer
    ///
    /// Used when another slot is still bound to the same buffer and takes over its release.
    pub fn detach(&mut self) {
        if !self.flags.contains(BufferFlags::REGISTERED) {
            return;
        }
        trace!(buffer = ?self.buffer, "Detaching buffer bound to another slot");
        self.flags = BufferFlags::empty();
        self.damage = None;
        self.texture = None;
        self.buffer = None;
        if !self.is_held_by_hardware() {
            self.scanout = None;
        }
    }

    /// Record damage on the bound buffer
    ///
    /// Empty rectangles are ignored.
    pub fn set_damage(&mut self, damage: Rectangle<i32, Logical>, mode: DamageMode) {
        if damage.is_empty() {
            trace!(?damage, "Ignoring empty damage");
            return;
        }
        self.damage = match (mode, self.damage) {
            (DamageMode::Union, Some(previous)) => Some(previous.merge(damage)),
            _ => Some(damage),
        };
    }

    /// Create a lease for display hardware
    ///
    /// Returns `None` if the slot is not bound to an actual buffer, or if the client destroyed it.
    pub fn lease(&mut self) -> Option<ScanoutLease<B>> {
        if !self.is_registered() || self.is_destroyed() {
            return None;
        }
        let buffer = self.buffer.clone()?;
        let shared = self.scanout.get_or_insert_with(Default::default).clone();
        Some(ScanoutLease::new(buffer, shared))
    }

    /// Mark the bound client buffer as destroyed
    pub fn mark_destroyed(&mut self) {
        if self.is_registered() {
            self.flags.insert(BufferFlags::DESTROYED);
        }
    }

    /// Mark the bound buffer as shown
    pub fn set_displayed(&mut self) {
        if self.is_registered() {
            self.flags.insert(BufferFlags::DISPLAYED);
        }
    }

    /// Cache a renderer texture for the bound buffer
    pub fn set_texture(&mut self, texture: TextureId) {
        self.texture = Some(texture);
    }

    /// Whether the slot is bound to exactly this attach
    ///
    /// Two null attaches are considered identical.
    pub fn holds(&self, buffer: Option<&B>) -> bool {
        self.is_registered() && self.buffer.as_ref() == buffer
    }

    /// Whether the slot is bound to an attach
    pub fn is_registered(&self) -> bool {
        self.flags.contains(BufferFlags::REGISTERED)
    }

    /// Whether the slot can be handed out by the pool
    pub fn is_free(&self) -> bool {
        !self.is_registered() && !self.is_held_by_hardware()
    }

    /// Whether a lease for this slot is alive
    pub fn is_held_by_hardware(&self) -> bool {
        self.scanout.as_ref().map_or(false, |shared| shared.holders() > 0)
    }

    /// Whether the client destroyed the bound buffer
    pub fn is_destroyed(&self) -> bool {
        self.flags.contains(BufferFlags::DESTROYED) || self.buffer.as_ref().map_or(false, |b| !b.is_alive())
    }

    /// Whether the bound buffer has been shown
    pub fn is_displayed(&self) -> bool {
        self.flags.contains(BufferFlags::DISPLAYED)
    }

    /// Whether the slot holds an actual buffer rather than a null attach
    pub fn has_content(&self) -> bool {
        self.is_registered() && self.buffer.is_some()
    }

    /// Current flags of the slot
    pub fn flags(&self) -> BufferFlags {
        self.flags
    }

    /// Damage recorded since the buffer was attached
    pub fn damage(&self) -> Option<Rectangle<i32, Logical>> {
        self.damage
    }

    /// Whether valid damage was recorded since the buffer was attached
    pub fn has_valid_damage(&self) -> bool {
        self.damage.is_some()
    }

    /// The bound client buffer
    pub fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }

    /// Dimensions of the bound buffer, empty for a null attach
    pub fn size(&self) -> Size<i32, Buffer> {
        self.size
    }

    /// Storage of the bound buffer
    pub fn kind(&self) -> Option<BufferKind> {
        self.buffer.as_ref().map(ClientBuffer::kind)
    }

    /// Whether the bound buffer lives in shared memory
    pub fn is_shm(&self) -> bool {
        self.kind() == Some(BufferKind::Shm)
    }

    /// Texture created for the bound buffer, if any
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }
}
