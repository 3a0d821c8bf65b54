//! Output advertising capabilities
//!
//! This module provides the `wl_output` global of an [`Output`], telling clients where the output
//! is located, its physical properties and its current mode.
//!
//! # How to use it
//!
//! Create an [`Output`] and call [`Output::create_global`] to advertise it. Every change done
//! through the [`Output`] afterwards is forwarded to the bound clients.
//!
//! ```no_run
//! # extern crate wayland_server;
//! use wlframe::delegate_output;
//! use wlframe::output::Output;
//! use wlframe::utils::Rectangle;
//! use wlframe::wayland::output::OutputHandler;
//!
//! # struct State;
//! # let mut display = wayland_server::Display::<State>::new().unwrap();
//! let output = Output::new("output-0".into(), Rectangle::from_size((1920, 1080).into()));
//! let _global = output.create_global::<State>(&display.handle());
//!
//! impl OutputHandler for State {}
//! delegate_output!(State);
//! ```

use tracing::trace;
use wayland_server::{
    backend::GlobalId,
    protocol::wl_output::{self, Mode as WMode, WlOutput},
    Dispatch, DisplayHandle, GlobalDispatch, Resource,
};

pub use crate::output::{Mode, Output, PhysicalProperties, Subpixel, WeakOutput};
use crate::output::Inner;

mod handlers;

/// Version of the advertised `wl_output` globals
pub const OUTPUT_VERSION: u32 = 4;

/// Handler for `wl_output`
pub trait OutputHandler {
    /// A client bound an output
    fn output_bound(&mut self, _output: Output, _wl_output: WlOutput) {}
}

/// Dispatch target of the `wl_output` globals
#[derive(Debug)]
pub struct OutputManagerState;

/// Global data of a `wl_output` global
#[derive(Debug)]
pub struct WlOutputData {
    pub(crate) output: Output,
}

/// User data of a `wl_output` resource
#[derive(Debug)]
pub struct OutputUserData {
    pub(crate) output: WeakOutput,
}

impl OutputUserData {
    /// The output this resource refers to, if it still exists
    pub fn output(&self) -> Option<Output> {
        self.output.upgrade()
    }
}

impl From<Subpixel> for wl_output::Subpixel {
    fn from(subpixel: Subpixel) -> Self {
        match subpixel {
            Subpixel::Unknown => wl_output::Subpixel::Unknown,
            Subpixel::None => wl_output::Subpixel::None,
            Subpixel::HorizontalRgb => wl_output::Subpixel::HorizontalRgb,
            Subpixel::HorizontalBgr => wl_output::Subpixel::HorizontalBgr,
            Subpixel::VerticalRgb => wl_output::Subpixel::VerticalRgb,
            Subpixel::VerticalBgr => wl_output::Subpixel::VerticalBgr,
        }
    }
}

impl Inner {
    pub(crate) fn send_geometry_to(&self, output: &WlOutput) {
        output.geometry(
            self.geometry.loc.x,
            self.geometry.loc.y,
            self.physical.size.w,
            self.physical.size.h,
            self.physical.subpixel.into(),
            self.physical.make.clone(),
            self.physical.model.clone(),
            wl_output::Transform::Normal,
        );
    }

    pub(crate) fn send_mode_to(&self, output: &WlOutput) {
        let mode = self.mode();
        output.mode(
            WMode::Current | WMode::Preferred,
            mode.size.w,
            mode.size.h,
            mode.refresh,
        );
    }
}

impl Output {
    /// Create a new `wl_output` global for this output
    pub fn create_global<D>(&self, display: &DisplayHandle) -> GlobalId
    where
        D: GlobalDispatch<WlOutput, WlOutputData> + Dispatch<WlOutput, OutputUserData> + 'static,
    {
        display.create_global::<D, WlOutput, _>(OUTPUT_VERSION, WlOutputData { output: self.clone() })
    }

    /// Attempt to retrieve an [`Output`] from an existing resource
    pub fn from_resource(output: &WlOutput) -> Option<Output> {
        output.data::<OutputUserData>().and_then(|data| data.output.upgrade())
    }

    /// Check if this Output owns the given `wl_output`
    pub fn owns(&self, output: &WlOutput) -> bool {
        self.inner
            .lock()
            .unwrap()
            .instances
            .iter()
            .any(|instance| instance.id() == output.id())
    }

    pub(crate) fn wl_send_state(&self, mode_changed: bool) {
        let inner = self.inner.lock().unwrap();
        trace!(name = inner.name, instances = inner.instances.len(), "Sending output state");
        for instance in &inner.instances {
            inner.send_geometry_to(instance);
            if mode_changed {
                inner.send_mode_to(instance);
            }
            if instance.version() >= 2 {
                instance.done();
            }
        }
    }
}

/// Macro to delegate implementation of wl_output to [`OutputManagerState`].
///
/// You must also implement [`OutputHandler`] to use this.
#[macro_export]
macro_rules! delegate_output {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_output::WlOutput: $crate::wayland::output::WlOutputData
        ] => $crate::wayland::output::OutputManagerState);

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty: [
            $crate::reexports::wayland_server::protocol::wl_output::WlOutput: $crate::wayland::output::OutputUserData
        ] => $crate::wayland::output::OutputManagerState);
    };
}
