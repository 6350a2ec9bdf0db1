use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::config::MonitorConfig;
use crate::display::DisplayDriver;
use crate::display::DriverLink;
use crate::ha::ApiError;
use crate::ha::Entity;
use crate::ha::StateClient;
use crate::router::HardwareEventSender;
use crate::settings::Settings;
use crate::settings::SettingsStore;
use crate::sprite::SpriteKind;
use crate::sprite::SpriteSet;
use super::message::Command;
use super::message::DriverEvent;
use super::message::Input;
use super::session::DeviceSnapshot;
use super::session::MonitorStatus;
use super::session::Phase;
use super::session::Session;
use super::session::select_sprite;

/// Everything the monitor needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub timing: MonitorConfig,
    pub device_id: String,
    pub assets_dir: PathBuf,
}

impl MonitorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timing: config.monitor.clone(),
            device_id: config.display.device_id.clone(),
            assets_dir: config.sprites.assets_dir.clone(),
        }
    }
}

/// Keeps the display in sync with one remote entity.
///
/// All state lives in this struct and is only mutated from [`Monitor::run`].
/// Network calls and timers run as separate tasks and report back through
/// the inbox.
pub struct Monitor {
    options: MonitorOptions,
    phase: Phase,
    session: Session,
    snapshot: Option<DeviceSnapshot>,
    displayed: Option<SpriteKind>,
    sprites: SpriteSet,
    driver: Box<dyn DisplayDriver>,
    client: Arc<dyn StateClient>,
    store: SettingsStore,
    inbox_tx: mpsc::UnboundedSender<Input>,
    inbox_rx: mpsc::UnboundedReceiver<Input>,
    hardware: HardwareEventSender,
    status_tx: watch::Sender<MonitorStatus>,
    poll_timer: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    /// One-shot reconcile polls scheduled after toggles
    delayed: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("phase", &self.phase)
            .field("session", &self.session)
            .field("snapshot", &self.snapshot)
            .field("displayed", &self.displayed)
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    pub fn new(
        options: MonitorOptions,
        driver: Box<dyn DisplayDriver>,
        client: Arc<dyn StateClient>,
        store: SettingsStore,
        hardware: HardwareEventSender,
    ) -> (Self, MonitorHandle) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(MonitorStatus::default());

        let handle = MonitorHandle {
            tx: inbox_tx.clone(),
            status: status_rx,
        };
        let monitor = Self {
            options,
            phase: Phase::Uninitialized,
            session: Session::default(),
            snapshot: None,
            displayed: None,
            sprites: SpriteSet::procedural(),
            driver,
            client,
            store,
            inbox_tx,
            inbox_rx,
            hardware,
            status_tx,
            poll_timer: None,
            reconnect_timer: None,
            delayed: Vec::new(),
        };
        (monitor, handle)
    }

    /// Process inputs until torn down.
    pub async fn run(mut self) {
        while let Some(input) = self.inbox_rx.recv().await {
            if self.dispatch(input).await.is_break() {
                break;
            }
        }
        debug!("Monitor loop exited");
    }

    async fn dispatch(&mut self, input: Input) -> ControlFlow<()> {
        if self.phase == Phase::TornDown {
            return ControlFlow::Break(());
        }

        match input {
            Input::Command(Command::Activate) => self.activate().await,
            Input::Command(Command::Unbind) => {
                info!("Client unbound, monitor keeps running");
            }
            Input::Command(Command::Teardown) => {
                self.teardown().await;
                self.publish_status();
                return ControlFlow::Break(());
            }
            Input::Command(Command::Toggle) => self.toggle(),
            Input::Command(Command::Refresh) | Input::PollTick | Input::ReconcileDue => {
                self.poll_now()
            }
            Input::Command(Command::Configure(settings)) => self.configure(settings).await,
            Input::Driver(DriverEvent::Connected) => self.on_connected().await,
            Input::Driver(DriverEvent::Disconnected) => self.on_disconnected(),
            Input::ReconnectDue => self.reconnect().await,
            Input::PollCompleted { entity_id, result } => {
                self.on_poll_completed(entity_id, result).await
            }
            Input::ToggleCompleted { entity_id, result } => {
                self.on_toggle_completed(entity_id, result)
            }
        }

        self.publish_status();
        ControlFlow::Continue(())
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!("Monitor phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn link(&self) -> DriverLink {
        DriverLink::new(self.inbox_tx.clone(), self.hardware.clone())
    }

    async fn activate(&mut self) {
        if self.phase != Phase::Uninitialized {
            debug!("Already activated ({}), ignoring", self.phase);
            return;
        }
        self.set_phase(Phase::Initializing);

        let settings = match self.store.load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, starting unconfigured: {}", e);
                Settings::default()
            }
        };
        self.apply_settings(&settings);
        self.sprites = SpriteSet::load(&self.options.assets_dir);

        info!("Connecting to {} display", self.driver.name());
        let link = self.link();
        if let Err(e) = self.driver.connect(link).await {
            warn!("Display connect failed: {}", e);
            self.enter_reconnecting();
        }
    }

    /// Push credentials to the client and remember the selected entity.
    fn apply_settings(&mut self, settings: &Settings) {
        match settings.credentials() {
            Some((url, token)) => {
                self.client.configure(url, token);
                self.session.configured = true;
            }
            None => {
                self.session.configured = false;
            }
        }

        let selected = settings.selected_entity().map(str::to_string);
        if selected != self.session.selected_entity_id {
            self.snapshot = None;
            self.session.consecutive_failures = 0;
            self.session.selected_entity_id = selected;
        }

        if !self.session.can_poll() {
            warn!("Monitor is not configured, polling withheld");
        }
    }

    async fn configure(&mut self, settings: Settings) {
        let could_poll = self.session.can_poll();
        self.apply_settings(&settings);
        if self.phase != Phase::Active {
            return;
        }

        if self.session.can_poll() {
            self.poll_now();
            self.start_poll_timer();
        } else if could_poll {
            self.stop_poll_timer();
            self.render(SpriteKind::Error).await;
        }
    }

    async fn on_connected(&mut self) {
        match self.phase {
            Phase::Initializing | Phase::Reconnecting { .. } => {}
            _ => {
                debug!("Ignoring connected callback in {}", self.phase);
                return;
            }
        }
        self.cancel_reconnect();

        if let Err(e) = self.driver.register(&self.options.device_id).await {
            warn!("Failed to register display: {}", e);
            self.enter_reconnecting();
            return;
        }
        self.session.registered = true;
        info!("Display registered as {}", self.options.device_id);
        self.set_phase(Phase::Active);
        self.resume().await;
    }

    async fn resume(&mut self) {
        if self.session.can_poll() {
            self.poll_now();
            self.start_poll_timer();
        } else {
            self.render(SpriteKind::Error).await;
        }
    }

    fn on_disconnected(&mut self) {
        match self.phase {
            Phase::Active => {
                warn!("Display disconnected, polling suspended");
                self.stop_poll_timer();
                self.session.registered = false;
                self.enter_reconnecting();
            }
            Phase::Initializing => self.enter_reconnecting(),
            Phase::Reconnecting { .. } => self.schedule_reconnect(),
            _ => debug!("Ignoring disconnected callback in {}", self.phase),
        }
    }

    fn enter_reconnecting(&mut self) {
        self.set_phase(Phase::Reconnecting { attempt: 0 });
        self.schedule_reconnect();
    }

    /// Replace any pending reconnect attempt with one after the backoff.
    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();
        let tx = self.inbox_tx.clone();
        let delay = self.options.timing.reconnect_delay();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::ReconnectDue);
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect_timer.take() {
            handle.abort();
        }
    }

    async fn reconnect(&mut self) {
        let Phase::Reconnecting { attempt } = self.phase else {
            return;
        };
        let attempt = attempt + 1;
        self.set_phase(Phase::Reconnecting { attempt });
        info!("Reconnecting to display (attempt {})", attempt);

        // The next attempt is armed before this one runs; a connected
        // callback cancels it.
        self.schedule_reconnect();
        let link = self.link();
        if let Err(e) = self.driver.connect(link).await {
            warn!("Reconnect attempt {} failed: {}", attempt, e);
        }
    }

    fn start_poll_timer(&mut self) {
        if self.poll_timer.is_some() {
            return;
        }
        let tx = self.inbox_tx.clone();
        let period = self.options.timing.poll_interval();

        self.poll_timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                if tx.send(Input::PollTick).is_err() {
                    break;
                }
            }
        }));
        debug!("Polling every {:?}", period);
    }

    fn stop_poll_timer(&mut self) {
        if let Some(handle) = self.poll_timer.take() {
            handle.abort();
            debug!("Polling stopped");
        }
    }

    /// Start a state fetch without waiting for it.
    fn poll_now(&mut self) {
        if self.phase != Phase::Active {
            return;
        }
        let Some(entity_id) = self.session.selected_entity_id.clone() else {
            return;
        };
        if !self.session.configured {
            return;
        }

        let client = Arc::clone(&self.client);
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = client.entity_state(&entity_id).await;
            let _ = tx.send(Input::PollCompleted { entity_id, result });
        });
    }

    async fn on_poll_completed(&mut self, entity_id: String, result: Result<Entity, ApiError>) {
        if self.session.selected_entity_id.as_deref() != Some(entity_id.as_str()) {
            debug!("Discarding poll result for {}", entity_id);
            return;
        }

        match result {
            Ok(entity) => {
                self.session.consecutive_failures = 0;
                let snapshot = DeviceSnapshot::from(&entity);
                if self.snapshot.as_ref().map(|s| s.is_on) != Some(snapshot.is_on) {
                    info!(
                        "{} is now {}",
                        entity.display_name(),
                        if snapshot.is_on { "on" } else { "off" }
                    );
                }
                let kind = select_sprite(false, snapshot.is_on);
                self.snapshot = Some(snapshot);
                // Re-pushed on every poll in case the display was cleared
                self.render(kind).await;
            }
            Err(e) => {
                self.session.consecutive_failures += 1;
                warn!(
                    "Poll of {} failed ({} in a row): {}",
                    entity_id, self.session.consecutive_failures, e
                );
                if self.session.consecutive_failures >= self.options.timing.failure_threshold {
                    self.render(SpriteKind::Error).await;
                }
            }
        }
    }

    fn toggle(&mut self) {
        if !self.session.configured {
            warn!("Cannot toggle: not configured");
            return;
        }
        let Some(entity_id) = self.session.selected_entity_id.clone() else {
            warn!("Cannot toggle: no entity selected");
            return;
        };

        info!("Toggling {}", entity_id);
        let client = Arc::clone(&self.client);
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            let result = client.toggle(&entity_id).await;
            let _ = tx.send(Input::ToggleCompleted { entity_id, result });
        });
    }

    fn on_toggle_completed(&mut self, entity_id: String, result: Result<(), ApiError>) {
        match result {
            Ok(()) => debug!("Toggled {}", entity_id),
            Err(e) => warn!("Toggle of {} failed: {}", entity_id, e),
        }
        self.schedule_reconcile(self.options.timing.toggle_settle());
    }

    fn schedule_reconcile(&mut self, delay: Duration) {
        self.delayed.retain(|handle| !handle.is_finished());
        let tx = self.inbox_tx.clone();
        self.delayed.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Input::ReconcileDue);
        }));
    }

    /// Draw `kind` on the display. Failures are logged and swallowed.
    async fn render(&mut self, kind: SpriteKind) {
        if self.phase != Phase::Active || !self.session.registered {
            debug!("Not rendering {} while {}", kind, self.phase);
            return;
        }

        let sprite = Arc::clone(self.sprites.get(kind));
        let frame = match self.driver.build_frame(&sprite) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to build {} frame: {}", kind, e);
                return;
            }
        };
        match self.driver.push(frame).await {
            Ok(()) => self.displayed = Some(kind),
            Err(e) => warn!("Failed to push {} frame: {}", kind, e),
        }
    }

    async fn teardown(&mut self) {
        info!("Tearing down monitor");
        self.set_phase(Phase::TornDown);
        self.stop_poll_timer();
        self.cancel_reconnect();
        for handle in self.delayed.drain(..) {
            handle.abort();
        }

        if self.session.registered {
            if let Err(e) = self.driver.unregister().await {
                warn!("Failed to unregister display: {}", e);
            }
            self.session.registered = false;
        }
        self.driver.release().await;
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(MonitorStatus {
            phase: self.phase,
            configured: self.session.configured,
            registered: self.session.registered,
            consecutive_failures: self.session.consecutive_failures,
            selected_entity_id: self.session.selected_entity_id.clone(),
            snapshot: self.snapshot.clone(),
            displayed: self.displayed,
        });
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop_poll_timer();
        self.cancel_reconnect();
        for handle in self.delayed.drain(..) {
            handle.abort();
        }
    }
}

/// Cloneable handle for sending commands to a running [`Monitor`].
///
/// Every method returns immediately; the monitor processes commands in the
/// order they were sent.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<MonitorStatus>,
}

impl MonitorHandle {
    fn send(&self, command: Command) {
        if self.tx.send(Input::Command(command)).is_err() {
            debug!("Monitor is gone, command dropped");
        }
    }

    pub fn activate(&self) {
        self.send(Command::Activate);
    }

    pub fn unbind(&self) {
        self.send(Command::Unbind);
    }

    pub fn teardown(&self) {
        self.send(Command::Teardown);
    }

    pub fn toggle(&self) {
        self.send(Command::Toggle);
    }

    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn configure(&self, settings: Settings) {
        self.send(Command::Configure(settings));
    }

    /// Subscribe to status updates.
    pub fn status(&self) -> watch::Receiver<MonitorStatus> {
        self.status.clone()
    }

    pub fn current_status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }
}
