use std::{
    fs::File,
    os::unix::{io::AsFd, net::UnixStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use wayland_client::{
    globals::{registry_queue_init, GlobalList, GlobalListContents},
    protocol as client, Connection, DispatchError, EventQueue, QueueHandle,
};
use wayland_server::{
    backend::ClientData,
    protocol::{
        wl_buffer::WlBuffer,
        wl_shm::{self, WlShm},
        wl_shm_pool::{self, WlShmPool},
        wl_surface::WlSurface,
    },
    Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New, WEnum,
};

use super::*;
use crate::{
    surface::{BufferKind, BufferMetadata, SurfaceConfig, SurfaceEvent},
    utils::{Point, Size},
};

/*
 * Server side
 */

#[derive(Debug, Default)]
struct Recorded {
    events: Vec<SurfaceEvent>,
    dirty: usize,
    destroyed: usize,
}

struct TestServer {
    compositor_state: CompositorState,
    recorded: Recorded,
    to_present: Vec<WlSurface>,
}

impl CompositorHandler for TestServer {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn buffer_metadata(&mut self, buffer: &WlBuffer) -> Option<BufferMetadata> {
        buffer.data::<Option<BufferMetadata>>().copied().flatten()
    }

    fn surface_event(&mut self, _surface: &WlSurface, event: SurfaceEvent) {
        self.recorded.events.push(event);
    }

    fn mark_surface_dirty(&mut self, surface: &WlSurface) {
        self.recorded.dirty += 1;
        self.to_present.push(surface.clone());
    }

    fn surface_destroyed(&mut self, _surface: &WlSurface) {
        self.recorded.destroyed += 1;
    }
}

crate::delegate_compositor!(TestServer);

impl GlobalDispatch<WlShm, ()> for TestServer {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<WlShm, ()> for TestServer {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, .. } = request {
            data_init.init(id, ());
        }
    }
}

impl Dispatch<WlShmPool, ()> for TestServer {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlShmPool,
        request: wl_shm_pool::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm_pool::Request::CreateBuffer {
            id,
            width,
            height,
            format,
            ..
        } = request
        {
            // only xrgb is understood by this compositor
            let metadata = match format {
                WEnum::Value(wl_shm::Format::Xrgb8888) => Some(BufferMetadata {
                    size: (width, height).into(),
                    kind: BufferKind::Shm,
                }),
                _ => None,
            };
            data_init.init(id, metadata);
        }
    }
}

impl Dispatch<WlBuffer, Option<BufferMetadata>> for TestServer {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &WlBuffer,
        _request: wayland_server::protocol::wl_buffer::Request,
        _data: &Option<BufferMetadata>,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

struct TestClientData;

impl ClientData for TestClientData {}

fn spawn_server(stream: UnixStream, config: SurfaceConfig, stop: Arc<AtomicBool>) -> JoinHandle<Recorded> {
    thread::spawn(move || {
        let mut display = Display::<TestServer>::new().unwrap();
        let mut dh = display.handle();
        let compositor_state = CompositorState::new::<TestServer>(&dh, config).unwrap();
        dh.create_global::<TestServer, WlShm, ()>(1, ());
        dh.insert_client(stream, Arc::new(TestClientData)).unwrap();

        let mut state = TestServer {
            compositor_state,
            recorded: Recorded::default(),
            to_present: Vec::new(),
        };
        while !stop.load(Ordering::Acquire) {
            display.dispatch_clients(&mut state).unwrap();
            // present everything damaged since the last iteration
            for surface in std::mem::take(&mut state.to_present) {
                let _ = send_frame_callback(&mut state, &surface);
            }
            let _ = display.flush_clients();
            thread::sleep(Duration::from_millis(1));
        }
        state.recorded
    })
}

/*
 * Client side
 */

#[derive(Debug, Default)]
struct TestClient {
    frames_done: usize,
}

impl wayland_client::Dispatch<client::wl_registry::WlRegistry, GlobalListContents> for TestClient {
    fn event(
        _state: &mut Self,
        _proxy: &client::wl_registry::WlRegistry,
        _event: client::wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
    }
}

impl wayland_client::Dispatch<client::wl_callback::WlCallback, ()> for TestClient {
    fn event(
        state: &mut Self,
        _proxy: &client::wl_callback::WlCallback,
        event: client::wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        _qhandle: &QueueHandle<Self>,
    ) {
        if let client::wl_callback::Event::Done { .. } = event {
            state.frames_done += 1;
        }
    }
}

wayland_client::delegate_noop!(TestClient: client::wl_compositor::WlCompositor);
wayland_client::delegate_noop!(TestClient: client::wl_shm_pool::WlShmPool);
wayland_client::delegate_noop!(TestClient: ignore client::wl_shm::WlShm);
wayland_client::delegate_noop!(TestClient: ignore client::wl_surface::WlSurface);
wayland_client::delegate_noop!(TestClient: ignore client::wl_buffer::WlBuffer);

struct Fixture {
    conn: Connection,
    queue: EventQueue<TestClient>,
    client: TestClient,
    compositor: client::wl_compositor::WlCompositor,
    shm: client::wl_shm::WlShm,
    stop: Arc<AtomicBool>,
    server: JoinHandle<Recorded>,
}

impl Fixture {
    fn new(config: SurfaceConfig) -> Fixture {
        let (server_side, client_side) = UnixStream::pair().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let server = spawn_server(server_side, config, stop.clone());

        let conn = Connection::from_socket(client_side).unwrap();
        let (globals, queue): (GlobalList, EventQueue<TestClient>) = registry_queue_init(&conn).unwrap();
        let qh = queue.handle();
        let compositor = globals.bind(&qh, 1..=COMPOSITOR_VERSION, ()).unwrap();
        let shm = globals.bind(&qh, 1..=1, ()).unwrap();

        Fixture {
            conn,
            queue,
            client: TestClient::default(),
            compositor,
            shm,
            stop,
            server,
        }
    }

    fn qh(&self) -> QueueHandle<TestClient> {
        self.queue.handle()
    }

    fn create_surface(&self) -> client::wl_surface::WlSurface {
        self.compositor.create_surface(&self.qh(), ())
    }

    fn create_buffer(&self, format: client::wl_shm::Format) -> client::wl_buffer::WlBuffer {
        let file = File::open("/dev/null").unwrap();
        let pool = self.shm.create_pool(file.as_fd(), 4096, &self.qh(), ());
        let buffer = pool.create_buffer(0, 16, 16, 64, format, &self.qh(), ());
        pool.destroy();
        buffer
    }

    fn roundtrip(&mut self) -> Result<usize, DispatchError> {
        self.queue.roundtrip(&mut self.client)
    }

    fn protocol_error_code(&self) -> Option<u32> {
        self.conn.protocol_error().map(|err| err.code)
    }

    fn finish(self) -> (TestClient, Recorded) {
        self.stop.store(true, Ordering::Release);
        (self.client, self.server.join().unwrap())
    }
}

#[test]
fn surface_requests_reach_handler() {
    let mut fixture = Fixture::new(SurfaceConfig::default());
    let surface = fixture.create_surface();
    let buffer = fixture.create_buffer(client::wl_shm::Format::Xrgb8888);

    // without apply_attach_offset the offset is dropped
    surface.attach(Some(&buffer), 3, 4);
    surface.damage(0, 0, 16, 16);
    surface.frame(&fixture.qh(), ());
    surface.commit();
    fixture.roundtrip().unwrap();
    fixture.roundtrip().unwrap();

    surface.destroy();
    fixture.roundtrip().unwrap();
    assert_eq!(fixture.protocol_error_code(), None);

    let (client, recorded) = fixture.finish();
    assert_eq!(client.frames_done, 1);
    assert_eq!(recorded.dirty, 1);
    assert_eq!(recorded.destroyed, 1);
    assert!(recorded.events.contains(&SurfaceEvent::Mapped));
    assert!(recorded.events.contains(&SurfaceEvent::SizeChanged(Size::new(16, 16))));
    assert!(!recorded
        .events
        .iter()
        .any(|event| matches!(event, SurfaceEvent::PositionChanged(_))));
}

#[test]
fn attach_offset_moves_surface() {
    let mut fixture = Fixture::new(SurfaceConfig::default().with_attach_offset(true));
    let surface = fixture.create_surface();
    let buffer = fixture.create_buffer(client::wl_shm::Format::Xrgb8888);

    surface.attach(Some(&buffer), 5, 7);
    surface.damage(0, 0, 16, 16);
    fixture.roundtrip().unwrap();

    let (_, recorded) = fixture.finish();
    assert!(recorded
        .events
        .contains(&SurfaceEvent::PositionChanged(Point::new(5, 7))));
}

#[test]
fn unsupported_buffer_is_a_protocol_error() {
    let mut fixture = Fixture::new(SurfaceConfig::default());
    let surface = fixture.create_surface();
    let buffer = fixture.create_buffer(client::wl_shm::Format::Argb8888);

    surface.attach(Some(&buffer), 0, 0);
    assert!(fixture.roundtrip().is_err());
    assert_eq!(fixture.protocol_error_code(), Some(ERROR_UNSUPPORTED_BUFFER));

    fixture.finish();
}

#[test]
fn pool_exhaustion_is_a_protocol_error() {
    let config = SurfaceConfig::default().with_pool_size(std::num::NonZeroUsize::new(1).unwrap());
    let mut fixture = Fixture::new(config);
    let surface = fixture.create_surface();
    let first = fixture.create_buffer(client::wl_shm::Format::Xrgb8888);
    let second = fixture.create_buffer(client::wl_shm::Format::Xrgb8888);

    surface.attach(Some(&first), 0, 0);
    surface.damage(0, 0, 16, 16);
    surface.attach(Some(&second), 0, 0);
    assert!(fixture.roundtrip().is_err());
    assert_eq!(fixture.protocol_error_code(), Some(ERROR_POOL_EXHAUSTED));

    fixture.finish();
}

#[test]
fn destroyed_surface_drops_frame_callbacks() {
    let mut fixture = Fixture::new(SurfaceConfig::default());
    let surface = fixture.create_surface();
    let buffer = fixture.create_buffer(client::wl_shm::Format::Xrgb8888);

    // never damaged, so nothing gets presented before the destruction
    surface.attach(Some(&buffer), 0, 0);
    surface.frame(&fixture.qh(), ());
    surface.destroy();
    fixture.roundtrip().unwrap();
    fixture.roundtrip().unwrap();

    let (client, recorded) = fixture.finish();
    assert_eq!(recorded.destroyed, 1);
    assert_eq!(recorded.dirty, 0);
    assert_eq!(client.frames_done, 0);
}
