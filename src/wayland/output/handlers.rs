use tracing::{trace, warn_span};
use wayland_server::{
    protocol::wl_output::{self, WlOutput},
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

use super::{OutputHandler, OutputManagerState, OutputUserData, WlOutputData};

/*
 * Wl Output
 */

impl<D> GlobalDispatch<WlOutput, WlOutputData, D> for OutputManagerState
where
    D: GlobalDispatch<WlOutput, WlOutputData>,
    D: Dispatch<WlOutput, OutputUserData>,
    D: OutputHandler,
    D: 'static,
{
    fn bind(
        state: &mut D,
        _dh: &DisplayHandle,
        _client: &Client,
        resource: New<WlOutput>,
        global_data: &WlOutputData,
        data_init: &mut DataInit<'_, D>,
    ) {
        let output = data_init.init(
            resource,
            OutputUserData {
                output: global_data.output.downgrade(),
            },
        );

        let mut inner = global_data.output.inner.lock().unwrap();

        let span = warn_span!("output_bind", name = inner.name);
        let _enter = span.enter();

        trace!("New WlOutput global instantiated");

        inner.send_geometry_to(&output);
        inner.send_mode_to(&output);

        if output.version() >= 4 {
            output.name(inner.name.clone());
            output.description(format!(
                "{} - {} - {}",
                inner.physical.make, inner.physical.model, inner.name
            ));
        }

        if output.version() >= 2 {
            output.scale(1);
            output.done();
        }

        inner.instances.push(output.clone());

        drop(inner);
        state.output_bound(global_data.output.clone(), output);
    }
}

impl<D> Dispatch<WlOutput, OutputUserData, D> for OutputManagerState
where
    D: Dispatch<WlOutput, OutputUserData>,
{
    fn request(
        _state: &mut D,
        _client: &Client,
        _resource: &WlOutput,
        request: wl_output::Request,
        _data: &OutputUserData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            wl_output::Request::Release => {
                // handled in the destruction callback
            }
            _ => unreachable!(),
        }
    }

    fn destroyed(
        _state: &mut D,
        _client_id: wayland_server::backend::ClientId,
        output: &WlOutput,
        data: &OutputUserData,
    ) {
        if let Some(o) = data.output.upgrade() {
            o.inner
                .lock()
                .unwrap()
                .instances
                .retain(|o| o.id() != output.id());
        }
    }
}
