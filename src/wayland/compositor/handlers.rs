use tracing::{trace, warn};
use wayland_server::{
    protocol::{
        wl_callback::{self, WlCallback},
        wl_compositor::{self, WlCompositor},
        wl_region::{self, WlRegion},
        wl_surface::{self, WlSurface},
    },
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use crate::{
    surface::SurfaceError,
    utils::{Logical, Point, Rectangle},
};

use super::{
    CompositorHandler, CompositorState, Hooks, SurfaceUserData, WlClientBuffer, ERROR_POOL_EXHAUSTED,
    ERROR_UNSUPPORTED_BUFFER,
};

/*
 * wl_compositor
 */

impl<D> GlobalDispatch<WlCompositor, (), D> for CompositorState
where
    D: GlobalDispatch<WlCompositor, ()>,
    D: Dispatch<WlCompositor, ()>,
    D: Dispatch<WlSurface, SurfaceUserData>,
    D: Dispatch<WlRegion, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<WlCompositor, (), D> for CompositorState
where
    D: Dispatch<WlCompositor, ()>,
    D: Dispatch<WlSurface, SurfaceUserData>,
    D: Dispatch<WlRegion, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                let config = state.compositor_state().config();
                let surface = data_init.init(id, SurfaceUserData::new(config));
                trace!(id = ?surface.id(), "Creating a new wl_surface");
            }
            wl_compositor::Request::CreateRegion { id } => {
                let region = data_init.init(id, ());
                trace!(id = ?region.id(), "Creating a new wl_region");
            }
            _ => unreachable!(),
        }
    }
}

/*
 * wl_surface
 */

impl<D> Dispatch<WlSurface, SurfaceUserData, D> for CompositorState
where
    D: Dispatch<WlSurface, SurfaceUserData>,
    D: Dispatch<WlCallback, ()>,
    D: CompositorHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        surface: &WlSurface,
        request: wl_surface::Request,
        data: &SurfaceUserData,
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_surface::Request::Attach { buffer, x, y } => {
                let buffer = match buffer {
                    Some(buffer) => match state.buffer_metadata(&buffer) {
                        Some(metadata) => Some(WlClientBuffer::new(buffer, metadata)),
                        None => {
                            warn!(surface = ?surface.id(), buffer = ?buffer.id(), "Attach of unsupported buffer");
                            surface.post_error(ERROR_UNSUPPORTED_BUFFER, "the attached buffer is not supported");
                            return;
                        }
                    },
                    None => None,
                };

                let mut inner = data.inner.lock().unwrap();
                match inner.attach(buffer) {
                    Ok(()) => {
                        if inner.config().apply_attach_offset && (x, y) != (0, 0) {
                            let position = inner.position() + Point::<i32, Logical>::from((x, y));
                            inner.set_position(position, &mut Hooks { state, surface });
                        }
                    }
                    Err(SurfaceError::PoolExhausted) => {
                        surface.post_error(
                            ERROR_POOL_EXHAUSTED,
                            "too many buffers attached without frame completion",
                        );
                    }
                    Err(SurfaceError::Destroyed) => {
                        trace!(surface = ?surface.id(), "Attach on destroyed surface");
                    }
                }
            }
            wl_surface::Request::Damage { x, y, width, height }
            | wl_surface::Request::DamageBuffer { x, y, width, height } => {
                let damage = Rectangle::<i32, Logical>::new((x, y).into(), (width, height).into());
                data.inner
                    .lock()
                    .unwrap()
                    .damage(damage, &mut Hooks { state, surface });
            }
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                data.inner.lock().unwrap().register_frame_callback(callback);
            }
            wl_surface::Request::SetOpaqueRegion { .. }
            | wl_surface::Request::SetInputRegion { .. }
            | wl_surface::Request::SetBufferTransform { .. }
            | wl_surface::Request::SetBufferScale { .. }
            | wl_surface::Request::Commit => {
                trace!(surface = ?surface.id(), "Ignoring unsupported surface state");
            }
            wl_surface::Request::Destroy => {
                // handled in the destruction callback
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(
        state: &mut D,
        _client_id: wayland_server::backend::ClientId,
        surface: &WlSurface,
        data: &SurfaceUserData,
    ) {
        data.inner
            .lock()
            .unwrap()
            .destroy(&mut Hooks { state, surface });
    }
}

/*
 * wl_region
 */

impl<D> Dispatch<WlRegion, (), D> for CompositorState
where
    D: Dispatch<WlRegion, ()>,
    D: CompositorHandler,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &WlRegion,
        request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_region::Request::Add { .. } | wl_region::Request::Subtract { .. } => {
                // regions are not tracked
            }
            wl_region::Request::Destroy => {}
            _ => unreachable!(),
        }
    }
}

/*
 * wl_callback
 */

impl<D> Dispatch<WlCallback, (), D> for CompositorState
where
    D: Dispatch<WlCallback, ()>,
    D: CompositorHandler,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &WlCallback,
        _request: wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        // wl_callback has no requests
    }
}
