//! Output
//!
//! This module provides a type describing a display of your compositor: where it sits in the
//! global compositor space, how large it is, and which part of it is available for placing
//! client surfaces.
//!
//! Outputs are independent of the surface buffer lifecycle. They are only consulted for layout.
//!
//! To advertise an output to wayland clients take a look at [`crate::wayland::output`], you need to
//! have the `wayland_frontend` feature enabled to use it.
//!
//! ```
//! use wlframe::output::{Output, PhysicalProperties, Subpixel};
//! use wlframe::utils::Rectangle;
//!
//! // Create the Output with given name and geometry
//! let output = Output::new("output-0".into(), Rectangle::from_size((1920, 1080).into()));
//! output.set_physical_properties(PhysicalProperties {
//!     size: (520, 290).into(),            // dimensions (width, height) in mm
//!     subpixel: Subpixel::HorizontalRgb,  // subpixel information
//!     make: "Screens Inc".into(),         // make of the monitor
//!     model: "Monitor Ultra".into(),      // model of the monitor
//! });
//! // keep a panel of 30 pixels free at the top
//! output.set_available_geometry(Some(Rectangle::new((0, 30).into(), (1920, 1050).into())));
//! assert!(output.contains((10, 10)));
//! ```

use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Mutex, Weak},
};

use tracing::{info, instrument};

#[cfg(feature = "wayland_frontend")]
use wayland_server::protocol::wl_output::WlOutput;

use crate::utils::{Logical, Physical, Point, Raw, Rectangle, Size};

/// An output mode
///
/// Outputs are not scaled, the mode always matches the output geometry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mode {
    /// The size of the mode, in pixels
    pub size: Size<i32, Physical>,
    /// The refresh rate in millihertz
    ///
    /// `1000` is one fps (frame per second), `2000` is 2 fps, etc...
    pub refresh: i32,
}

/// Subpixel geometry information
///
/// This enumeration describes how the physical pixels on an output are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Subpixel {
    /// Unknown subpixel geometry
    #[default]
    Unknown,
    /// No subpixel geometry
    None,
    /// Subpixels are arranged horizontally starting with
    /// red, then green, last blue
    HorizontalRgb,
    /// Subpixels are arranged horizontally starting with
    /// blue, then green, last red
    HorizontalBgr,
    /// Subpixels are arranged vertically starting with
    /// red, then green, last blue
    VerticalRgb,
    /// Subpixels are arranged vertically starting with
    /// blue, then green, last red
    VerticalBgr,
}

/// The physical properties of an output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhysicalProperties {
    /// The size of the monitor, in millimeters
    pub size: Size<i32, Raw>,
    /// The subpixel geometry
    pub subpixel: Subpixel,
    /// Textual representation of the make
    pub make: String,
    /// Textual representation of the model
    pub model: String,
}

/// Refresh rate outputs start with, in millihertz
pub const DEFAULT_REFRESH: i32 = 60_000;

#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) physical: PhysicalProperties,
    pub(crate) geometry: Rectangle<i32, Logical>,
    pub(crate) available: Option<Rectangle<i32, Logical>>,
    pub(crate) refresh: i32,

    // used by the wayland::output module.
    #[cfg(feature = "wayland_frontend")]
    pub(crate) instances: Vec<WlOutput>,
}

impl Inner {
    pub(crate) fn mode(&self) -> Mode {
        Mode {
            size: Size::new(self.geometry.size.w, self.geometry.size.h),
            refresh: self.refresh,
        }
    }
}

/// An abstract output.
///
/// This handle is cheap to clone, every clone refers to the same output.
#[derive(Debug, Clone)]
pub struct Output {
    pub(crate) inner: Arc<Mutex<Inner>>,
}

/// Weak variant of an [`Output`]
///
/// Can be used to refer to a potentially already destroyed output.
#[derive(Debug, Clone)]
pub struct WeakOutput {
    pub(crate) inner: Weak<Mutex<Inner>>,
}

impl Output {
    /// Create a new output with given name and geometry.
    #[instrument]
    pub fn new(name: String, geometry: Rectangle<i32, Logical>) -> Output {
        info!(name, "Creating new Output");

        Output {
            inner: Arc::new(Mutex::new(Inner {
                name,
                physical: PhysicalProperties::default(),
                geometry,
                available: None,
                refresh: DEFAULT_REFRESH,
                #[cfg(feature = "wayland_frontend")]
                instances: Vec::new(),
            })),
        }
    }

    /// Returns the name of the output
    pub fn name(&self) -> String {
        self.inner.lock().unwrap().name.clone()
    }

    /// Returns the physical properties of the output
    pub fn physical_properties(&self) -> PhysicalProperties {
        self.inner.lock().unwrap().physical.clone()
    }

    /// Replace the physical properties of the output
    ///
    /// Bound clients are sent the new geometry.
    pub fn set_physical_properties(&self, physical: PhysicalProperties) {
        self.inner.lock().unwrap().physical = physical;
        #[cfg(feature = "wayland_frontend")]
        self.wl_send_state(false);
    }

    /// Returns the area the output covers in the compositor space
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        self.inner.lock().unwrap().geometry
    }

    /// Move or resize the output
    ///
    /// Bound clients are sent the new geometry and mode.
    #[instrument(skip(self), fields(output = self.name()))]
    pub fn set_geometry(&self, geometry: Rectangle<i32, Logical>) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.geometry == geometry {
                return;
            }
            inner.geometry = geometry;
        }
        #[cfg(feature = "wayland_frontend")]
        self.wl_send_state(true);
    }

    /// Returns the location of the output in the compositor space
    pub fn location(&self) -> Point<i32, Logical> {
        self.inner.lock().unwrap().geometry.loc
    }

    /// Returns the current mode of the output
    pub fn mode(&self) -> Mode {
        self.inner.lock().unwrap().mode()
    }

    /// Set the refresh rate of the output, in millihertz
    pub fn set_refresh(&self, refresh: i32) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.refresh == refresh {
                return;
            }
            inner.refresh = refresh;
        }
        #[cfg(feature = "wayland_frontend")]
        self.wl_send_state(true);
    }

    /// Returns the part of the output surfaces may be placed on
    ///
    /// Defaults to the whole output, and never exceeds it.
    pub fn available_geometry(&self) -> Rectangle<i32, Logical> {
        let inner = self.inner.lock().unwrap();
        inner
            .available
            .and_then(|available| available.intersection(inner.geometry))
            .unwrap_or(inner.geometry)
    }

    /// Restrict the part of the output surfaces may be placed on
    ///
    /// `None` resets it to the whole output.
    pub fn set_available_geometry(&self, available: Option<Rectangle<i32, Logical>>) {
        self.inner.lock().unwrap().available = available;
    }

    /// Whether a point of the compositor space lies on this output
    pub fn contains(&self, point: impl Into<Point<i32, Logical>>) -> bool {
        self.geometry().contains(point)
    }

    /// Create a weak reference to this output
    pub fn downgrade(&self) -> WeakOutput {
        WeakOutput {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Output {}

impl Hash for Output {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl WeakOutput {
    /// Try to retrieve the original `Output`, if it still exists
    pub fn upgrade(&self) -> Option<Output> {
        self.inner.upgrade().map(|inner| Output { inner })
    }
}

impl PartialEq for WeakOutput {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for WeakOutput {}

#[cfg(test)]
mod tests {
    use super::{Output, DEFAULT_REFRESH};
    use crate::utils::{Rectangle, Size};

    #[test]
    fn mode_follows_geometry() {
        let output = Output::new("test".into(), Rectangle::new((100, 0).into(), (800, 600).into()));
        assert_eq!(output.mode().size, Size::new(800, 600));
        assert_eq!(output.mode().refresh, DEFAULT_REFRESH);

        output.set_geometry(Rectangle::new((0, 0).into(), (1024, 768).into()));
        output.set_refresh(75_000);
        assert_eq!(output.mode().size, Size::new(1024, 768));
        assert_eq!(output.mode().refresh, 75_000);
        assert!(output.contains((1023, 767)));
        assert!(!output.contains((1024, 0)));
    }

    #[test]
    fn available_geometry_is_clamped() {
        let output = Output::new("test".into(), Rectangle::from_size((800, 600).into()));
        assert_eq!(output.available_geometry(), output.geometry());

        output.set_available_geometry(Some(Rectangle::new((0, 30).into(), (900, 900).into())));
        assert_eq!(
            output.available_geometry(),
            Rectangle::new((0, 30).into(), (800, 570).into())
        );

        output.set_available_geometry(None);
        assert_eq!(output.available_geometry(), output.geometry());
    }

    #[test]
    fn weak_reference() {
        let output = Output::new("test".into(), Rectangle::from_size((1, 1).into()));
        let weak = output.downgrade();
        assert_eq!(weak.upgrade(), Some(output.clone()));
        drop(output);
        assert_eq!(weak.upgrade(), None);
    }
}
