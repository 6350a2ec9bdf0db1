#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use glyphd::config::MonitorConfig;
use glyphd::display::DisplayDriver;
use glyphd::display::DisplayError;
use glyphd::display::DriverLink;
use glyphd::display::MatrixFrame;
use glyphd::ha::ApiError;
use glyphd::ha::Attributes;
use glyphd::ha::Entity;
use glyphd::ha::Service;
use glyphd::ha::StateClient;
use glyphd::monitor::Monitor;
use glyphd::monitor::MonitorHandle;
use glyphd::monitor::MonitorOptions;
use glyphd::router::EventRouter;
use glyphd::settings::Settings;
use glyphd::settings::SettingsStore;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const ENTITY: &str = "light.kitchen";

pub fn entity(id: &str, state: &str) -> Entity {
    Entity {
        entity_id: id.to_string(),
        state: state.to_string(),
        attributes: Attributes {
            friendly_name: Some("Kitchen".to_string()),
            device_class: None,
        },
    }
}

pub fn configured_settings() -> Settings {
    let mut settings = Settings::default();
    settings.set_credentials("http://ha.local:8123", "token");
    settings.select_entity(ENTITY, "Kitchen");
    settings
}

/// Let every ready task run, advancing paused time by a hair.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[derive(Debug, Default)]
struct ClientState {
    configured: Option<(String, String)>,
    response: Option<Result<Entity, ApiError>>,
    toggle_response: Option<ApiError>,
    polls: usize,
    toggles: usize,
    poll_delay: Duration,
    toggle_delay: Duration,
}

/// In-memory [`StateClient`] with a scripted response and latency.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<ClientState>>,
}

impl FakeClient {
    pub fn respond(&self, response: Result<Entity, ApiError>) {
        self.state.lock().unwrap().response = Some(response);
    }

    pub fn fail_toggles(&self, error: ApiError) {
        self.state.lock().unwrap().toggle_response = Some(error);
    }

    /// Hold every state fetch for `delay` before answering.
    pub fn delay_polls(&self, delay: Duration) {
        self.state.lock().unwrap().poll_delay = delay;
    }

    pub fn delay_toggles(&self, delay: Duration) {
        self.state.lock().unwrap().toggle_delay = delay;
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    pub fn toggles(&self) -> usize {
        self.state.lock().unwrap().toggles
    }

    pub fn configured(&self) -> Option<(String, String)> {
        self.state.lock().unwrap().configured.clone()
    }
}

#[async_trait]
impl StateClient for FakeClient {
    fn configure(&self, base_url: &str, token: &str) {
        self.state.lock().unwrap().configured = Some((base_url.to_string(), token.to_string()));
    }

    fn is_configured(&self) -> bool {
        self.state.lock().unwrap().configured.is_some()
    }

    async fn probe(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn states(&self) -> Result<Vec<Entity>, ApiError> {
        let state = self.state.lock().unwrap();
        match &state.response {
            Some(Ok(entity)) => Ok(vec![entity.clone()]),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn entity_state(&self, entity_id: &str) -> Result<Entity, ApiError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            state.poll_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match &self.state.lock().unwrap().response {
            Some(response) => response.clone(),
            None => Ok(entity(entity_id, "off")),
        }
    }

    async fn call_service(&self, _service: Service, _entity_id: &str) -> Result<(), ApiError> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.toggles += 1;
            state.toggle_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match &self.state.lock().unwrap().toggle_response {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Connect,
    Register(String),
    Push(MatrixFrame),
    Unregister,
    Release,
}

#[derive(Debug)]
struct DriverState {
    calls: Vec<DriverCall>,
    link: Option<DriverLink>,
    /// Report `connected` straight from `connect`
    accept_connections: bool,
    fail_connects: bool,
    fail_register: bool,
}

/// Display driver that records every call.
#[derive(Debug, Clone)]
pub struct FakeDisplay {
    state: Arc<Mutex<DriverState>>,
}

impl Default for FakeDisplay {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(DriverState {
                calls: Vec::new(),
                link: None,
                accept_connections: true,
                fail_connects: false,
                fail_register: false,
            })),
        }
    }
}

impl FakeDisplay {
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Connect))
    }

    pub fn registrations(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Register(_)))
    }

    pub fn pushes(&self) -> usize {
        self.count(|c| matches!(c, DriverCall::Push(_)))
    }

    fn count(&self, f: impl Fn(&DriverCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| f(c)).count()
    }

    pub fn accept_connections(&self, accept: bool) {
        self.state.lock().unwrap().accept_connections = accept;
    }

    /// Make `connect` return an error instead of opening a link.
    pub fn fail_connects(&self, fail: bool) {
        self.state.lock().unwrap().fail_connects = fail;
    }

    pub fn fail_register(&self, fail: bool) {
        self.state.lock().unwrap().fail_register = fail;
    }

    /// Simulate the hardware link dropping.
    pub fn drop_link(&self) {
        let link = self.state.lock().unwrap().link.clone();
        link.expect("driver was never connected").disconnected();
    }

    /// Simulate a button event from the device.
    pub fn hardware_event(&self, name: &str) {
        let link = self.state.lock().unwrap().link.clone();
        link.expect("driver was never connected").hardware_event(name);
    }

    fn record(&self, call: DriverCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn refused() -> DisplayError {
    DisplayError::Transport("connection refused".to_string())
}

#[async_trait]
impl DisplayDriver for FakeDisplay {
    fn name(&self) -> &str {
        "fake"
    }

    fn dimensions(&self) -> (usize, usize) {
        (25, 25)
    }

    async fn connect(&mut self, link: DriverLink) -> Result<(), DisplayError> {
        self.record(DriverCall::Connect);
        let accept = {
            let mut state = self.state.lock().unwrap();
            if state.fail_connects {
                return Err(refused());
            }
            state.link = Some(link.clone());
            state.accept_connections
        };
        if accept {
            link.connected();
        }
        Ok(())
    }

    async fn register(&mut self, device_id: &str) -> Result<(), DisplayError> {
        self.record(DriverCall::Register(device_id.to_string()));
        if self.state.lock().unwrap().fail_register {
            return Err(refused());
        }
        Ok(())
    }

    async fn push(&mut self, frame: MatrixFrame) -> Result<(), DisplayError> {
        self.record(DriverCall::Push(frame));
        Ok(())
    }

    async fn unregister(&mut self) -> Result<(), DisplayError> {
        self.record(DriverCall::Unregister);
        Ok(())
    }

    async fn release(&mut self) {
        self.record(DriverCall::Release);
    }
}

/// A monitor wired to fakes, with an event router running.
pub struct Harness {
    pub handle: MonitorHandle,
    pub client: FakeClient,
    pub display: FakeDisplay,
    pub monitor_task: JoinHandle<()>,
    pub router_task: JoinHandle<()>,
    /// Holds the (empty) assets dir and the settings file
    pub dir: TempDir,
}

impl Harness {
    pub fn new(settings: &Settings) -> Self {
        Self::with_timing(settings, MonitorConfig::default())
    }

    pub fn with_timing(settings: &Settings, timing: MonitorConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        store.save(settings).unwrap();

        let client = FakeClient::default();
        let display = FakeDisplay::default();
        let options = MonitorOptions {
            timing,
            device_id: "DEVICE_23112".to_string(),
            assets_dir: dir.path().to_path_buf(),
        };

        let (hardware, events) = EventRouter::channel();
        let (monitor, handle) = Monitor::new(
            options,
            Box::new(display.clone()),
            Arc::new(client.clone()),
            store,
            hardware,
        );
        let router = EventRouter::new(events, handle.clone());

        Self {
            handle,
            client,
            display,
            monitor_task: tokio::spawn(monitor.run()),
            router_task: tokio::spawn(router.run()),
            dir,
        }
    }
}
