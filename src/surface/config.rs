use std::num::NonZeroUsize;

/// Number of buffer slots a surface gets when nothing else is configured
pub const DEFAULT_POOL_SIZE: NonZeroUsize = match NonZeroUsize::new(3) {
    Some(size) => size,
    None => unreachable!(),
};

/// How damage reported against the same buffer is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DamageMode {
    /// Only the most recently reported rectangle is kept
    #[default]
    Latest,
    /// The bounding box of every rectangle reported since the buffer was attached is kept
    Union,
}

/// Per-surface configuration
///
/// Passed by value when a [`Surface`](super::Surface) is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Number of buffer slots, bounding how many frames a client may have in flight
    pub pool_size: NonZeroUsize,
    /// Damage accumulation policy
    pub damage_mode: DamageMode,
    /// Flip the answer of [`Surface::is_y_inverted`](super::Surface::is_y_inverted)
    pub negate_y_inverted: bool,
    /// Whether the `x`/`y` arguments of `wl_surface.attach` move the surface
    pub apply_attach_offset: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig {
            pool_size: DEFAULT_POOL_SIZE,
            damage_mode: DamageMode::default(),
            negate_y_inverted: false,
            apply_attach_offset: false,
        }
    }
}

impl SurfaceConfig {
    /// Set the number of buffer slots
    pub fn with_pool_size(mut self, pool_size: NonZeroUsize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the damage accumulation policy
    pub fn with_damage_mode(mut self, damage_mode: DamageMode) -> Self {
        self.damage_mode = damage_mode;
        self
    }

    /// Negate the y-inversion reported for every buffer
    pub fn with_negate_y_inverted(mut self, negate: bool) -> Self {
        self.negate_y_inverted = negate;
        self
    }

    /// Honour the attach offset
    pub fn with_attach_offset(mut self, apply: bool) -> Self {
        self.apply_attach_offset = apply;
        self
    }
}
