//! Session facade.
//!
//! The [`Client`] composes the state machine, event bus, correlator and
//! queue around one [`SessionTransport`]. A dispatcher task consumes the
//! transport's event stream and is the only writer of lifecycle state and
//! the session cache:
//!
//! | Transport event | Effect |
//! |-----------------|--------|
//! | `Established` | Connected, publish `connected`, drain queue |
//! | `Chat` | publish `chat` |
//! | `VitalsChanged` | cache vitals, publish `health` |
//! | `Died` | count death, publish `death` |
//! | `Terminated` | Ended, publish `end`, tear down |
//! | `FatalError` | Failed, publish `error`, tear down |
//!
//! # Example
//!
//! ```no_run
//! use pilaf_client::{BridgeTransport, Client};
//!
//! # async fn example() -> pilaf_client::Result<()> {
//! let client = Client::builder()
//!     .username("pilaf_test_player")
//!     .transport(BridgeTransport::local()?)
//!     .build()?;
//!
//! client.connect().await?;
//! client.give_item("dragon_egg", 1)?;
//! let reply = client.execute_command("ability 1").await?;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{Command, EventKind, SessionEvent, TransportEvent};
use crate::session::{
    CommandCorrelator, CommandQueue, ConnectionState, ConnectionStateMachine, EventBus, Inventory,
    ItemStack, Position, Session, SessionIdentity, Subscription, Vitals,
};
use crate::transport::{EventStream, SessionTransport};

use super::builder::ClientBuilder;
use super::options::ClientOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Connection target.
    identity: SessionIdentity,

    /// Timing and command configuration.
    options: ClientOptions,

    /// Game session transport.
    transport: Arc<dyn SessionTransport>,

    /// Observer registry.
    bus: EventBus,

    /// Lifecycle state.
    machine: ConnectionStateMachine,

    /// In-flight commands.
    correlator: CommandCorrelator,

    /// Commands awaiting login.
    queue: CommandQueue,

    /// Last-known session state.
    session: Arc<Mutex<Session>>,

    /// Dispatcher task, once connecting.
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.get_mut().take() {
            handle.abort();
        }
    }
}

/// One-shot slot for the outcome of a connection attempt.
type LoginSlot = Arc<Mutex<Option<oneshot::Sender<Result<()>>>>>;

// ============================================================================
// Client
// ============================================================================

/// Control handle of one game session.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .field("pending_commands", &self.pending_commands())
            .field("queued_commands", &self.queued_commands())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn new(
        identity: SessionIdentity,
        options: ClientOptions,
        transport: Arc<dyn SessionTransport>,
    ) -> Self {
        let bus = EventBus::new();
        let machine = ConnectionStateMachine::new(bus.clone());
        let correlator = CommandCorrelator::new(
            bus.clone(),
            machine.clone(),
            Arc::clone(&transport),
            options.correlator_settings(),
        );
        let queue = CommandQueue::new(machine.clone(), correlator.clone());
        let session = Arc::new(Mutex::new(Session::new(identity.clone())));

        Self {
            inner: Arc::new(ClientInner {
                identity,
                options,
                transport,
                bus,
                machine,
                correlator,
                queue,
                session,
                dispatcher: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// Client - Lifecycle
// ============================================================================

impl Client {
    /// Opens the session and waits for login.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] if already connecting or connected
    /// - [`Error::TransportFatal`] if the transport fails before login
    /// - [`Error::SessionEnded`] if the transport ends before login
    /// - [`Error::ConnectTimeout`] if login takes longer than the connect
    ///   timeout; the session keeps whatever state it reaches later
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        inner.machine.begin()?;
        info!(identity = %inner.identity, "Connecting");

        let (tx, rx) = oneshot::channel();
        let slot: LoginSlot = Arc::new(Mutex::new(Some(tx)));
        let subscriptions = [EventKind::Connected, EventKind::Error, EventKind::End].map(|kind| {
            let slot = Arc::clone(&slot);
            inner.bus.subscribe(kind, move |event| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(login_outcome(event));
                }
            })
        });

        let events = match inner.transport.open(&inner.identity).await {
            Ok(events) => events,
            Err(e) => {
                self.unsubscribe_all(&subscriptions);
                let message = e.to_string();
                error!(error = %message, "Failed to open session");
                inner.machine.fail(&message);
                self.teardown();
                return Err(Error::transport_fatal(message));
            }
        };

        // disconnect() ran while the transport was still opening
        if inner.machine.state().is_terminal() {
            self.unsubscribe_all(&subscriptions);
            let reason = inner.options.disconnect_reason.as_str();
            inner.transport.close(reason);
            drop(events);
            warn!(identity = %inner.identity, reason, "Session closed while opening");
            return Err(Error::session_ended(reason));
        }

        let dispatcher = Dispatcher {
            bus: inner.bus.clone(),
            machine: inner.machine.clone(),
            correlator: inner.correlator.clone(),
            queue: inner.queue.clone(),
            session: Arc::clone(&inner.session),
        };
        *inner.dispatcher.lock() = Some(tokio::spawn(dispatcher.run(events)));

        let connect_timeout = inner.options.connect_timeout;
        let outcome = timeout(connect_timeout, rx).await;
        self.unsubscribe_all(&subscriptions);

        match outcome {
            Ok(Ok(result)) => {
                if result.is_ok() {
                    info!(identity = %inner.identity, "Connected");
                }
                result
            }
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                let timeout_ms = connect_timeout.as_millis() as u64;
                warn!(timeout_ms, state = %self.state(), "Connect timeout");
                Err(Error::connect_timeout(timeout_ms))
            }
        }
    }

    /// Closes the session and settles everything in flight.
    ///
    /// Pending commands fail with [`Error::ConnectionClosed`] and queued
    /// commands are discarded. Calling it again is a no-op.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        let state = inner.machine.state();

        if state.is_terminal() {
            debug!(%state, "Already disconnected");
        } else {
            let reason = inner.options.disconnect_reason.as_str();
            if state != ConnectionState::Disconnected {
                inner.transport.close(reason);
            }
            inner.machine.end(reason);
            info!(identity = %inner.identity, reason, "Disconnected");
        }

        self.teardown();
        if let Some(handle) = inner.dispatcher.lock().take() {
            handle.abort();
        }
    }

    fn teardown(&self) {
        self.inner.correlator.cancel_all();
        self.inner.queue.clear();
    }

    fn unsubscribe_all(&self, subscriptions: &[Subscription]) {
        for subscription in subscriptions {
            self.inner.bus.unsubscribe(subscription);
        }
    }
}

// ============================================================================
// Client - Commands
// ============================================================================

impl Client {
    /// Sends a command and waits for an acknowledging chat line.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] unless connected
    /// - [`Error::CommandTimeout`] if nothing acknowledges it in time
    /// - [`Error::ConnectionClosed`] if the session ends meanwhile
    pub async fn execute_command(&self, text: &str) -> Result<String> {
        self.execute(Command::raw(text)).await
    }

    /// Sends a typed command and waits for its response.
    pub async fn execute(&self, command: impl Into<Command>) -> Result<String> {
        self.inner.correlator.execute(&command.into()).await
    }

    /// Gives the player `count` of `item_type`; the outcome is only logged.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless connected.
    pub fn give_item(&self, item_type: &str, count: u32) -> Result<()> {
        self.inner
            .correlator
            .dispatch(&Command::give(item_type, count))
    }

    /// Puts `item_type` into `slot`; the outcome is only logged.
    ///
    /// `slot` is a vanilla slot id or a friendly name such as `offhand`.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless connected.
    pub fn equip_item(&self, item_type: &str, slot: &str) -> Result<()> {
        self.inner
            .correlator
            .dispatch(&Command::equip(item_type, slot))
    }

    /// Walks the player to a block; the outcome is only logged.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] unless connected.
    pub fn move_to(&self, x: i32, y: i32, z: i32) -> Result<()> {
        self.inner.machine.require_connected()?;

        let target = Position::new(x, y, z);
        let transport = Arc::clone(&self.inner.transport);
        debug!(%target, "Navigating");
        tokio::spawn(async move {
            if let Err(e) = transport.navigate_to(target).await {
                error!(%target, error = %e, "Navigation failed");
            }
        });
        Ok(())
    }

    /// Sends `text` once connected, or right away if already connected.
    ///
    /// Outcomes are only logged.
    pub fn queue_command(&self, text: &str) {
        self.inner.queue.enqueue(Command::raw(text));
    }
}

// ============================================================================
// Client - Session State
// ============================================================================

impl Client {
    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.machine.state()
    }

    /// Returns `true` if connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.machine.is_connected()
    }

    /// Returns the connection target.
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.inner.identity
    }

    /// Returns the options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the last reported vitals.
    #[must_use]
    pub fn vitals(&self) -> Option<Vitals> {
        self.inner.session.lock().vitals
    }

    /// Returns the deaths observed in this session.
    #[must_use]
    pub fn deaths(&self) -> u32 {
        self.inner.session.lock().deaths
    }

    /// Returns the player's block position.
    ///
    /// Read from the transport while connected, cached otherwise.
    #[must_use]
    pub fn get_position(&self) -> Option<Position> {
        self.refresh();
        self.inner.session.lock().position
    }

    /// Returns the non-empty inventory stacks in slot order.
    #[must_use]
    pub fn get_inventory(&self) -> Vec<ItemStack> {
        self.refresh();
        self.inner.session.lock().inventory.items()
    }

    /// Returns `true` if `item_type` is in `slot`, or anywhere for `"any"`.
    #[must_use]
    pub fn has_item(&self, item_type: &str, slot: &str) -> bool {
        self.refresh();
        self.inner.session.lock().inventory.has_item(item_type, slot)
    }

    /// Returns a snapshot of the cached session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    /// Returns the number of commands awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Returns the number of commands awaiting login.
    #[inline]
    #[must_use]
    pub fn queued_commands(&self) -> usize {
        self.inner.queue.len()
    }

    fn refresh(&self) {
        if !self.inner.machine.is_connected() {
            return;
        }

        let position = self.inner.transport.read_position();
        let slots = self.inner.transport.read_inventory_slots();

        let mut session = self.inner.session.lock();
        if position.is_some() {
            session.position = position;
        }
        session.inventory = Inventory::from_slots(slots);
    }
}

// ============================================================================
// Client - Observers
// ============================================================================

impl Client {
    /// Registers `callback` for events of `kind`.
    ///
    /// Callbacks run on the dispatcher task; a panicking callback is logged
    /// and skipped.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, callback)
    }

    /// Removes a registration; returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.inner.bus.unsubscribe(subscription)
    }
}

/// Maps the first lifecycle event after `begin` to the connect outcome.
fn login_outcome(event: &SessionEvent) -> Result<()> {
    match event {
        SessionEvent::Error { message } => Err(Error::transport_fatal(message.clone())),
        SessionEvent::End { reason } => Err(Error::session_ended(reason.clone())),
        _ => Ok(()),
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Consumer of the transport event stream.
struct Dispatcher {
    bus: EventBus,
    machine: ConnectionStateMachine,
    correlator: CommandCorrelator,
    queue: CommandQueue,
    session: Arc<Mutex<Session>>,
}

impl Dispatcher {
    async fn run(self, mut events: EventStream) {
        while let Some(event) = events.recv().await {
            trace!(event = event.name(), "Transport event");
            if self.handle(event).is_break() {
                break;
            }
        }

        // Stream closed without a terminal signal
        if self.machine.end("transport stream closed") {
            self.teardown();
        }

        debug!("Dispatcher terminated");
    }

    fn handle(&self, event: TransportEvent) -> ControlFlow<()> {
        match event {
            TransportEvent::Established => match self.machine.establish() {
                Ok(()) => {
                    info!("Logged in");
                    self.queue.drain();
                }
                Err(e) => warn!(error = %e, "Ignoring login signal"),
            },

            TransportEvent::Chat { sender, message } => {
                debug!(%sender, %message, "Chat");
                self.bus.publish(&SessionEvent::Chat { sender, message });
            }

            TransportEvent::VitalsChanged(vitals) => {
                self.session.lock().vitals = Some(vitals);
                self.bus.publish(&SessionEvent::Health(vitals));
            }

            TransportEvent::Died => {
                let deaths = {
                    let mut session = self.session.lock();
                    session.deaths += 1;
                    session.deaths
                };
                info!(deaths, "Player died");
                self.bus.publish(&SessionEvent::Death);
            }

            TransportEvent::Terminated { reason } => {
                if self.machine.end(&reason) {
                    info!(%reason, "Session ended");
                }
                self.teardown();
                return ControlFlow::Break(());
            }

            TransportEvent::FatalError { descriptor } => {
                if self.machine.fail(&descriptor) {
                    error!(error = %descriptor, "Session failed");
                }
                self.teardown();
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn teardown(&self) {
        self.correlator.cancel_all();
        self.queue.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
