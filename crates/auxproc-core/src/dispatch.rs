//! Signal dispatch and the main event loop.
//!
//! [`Dispatcher`] is pure state: it owns the registry, the processor,
//! and the store, and turns one inbound [`Signal`] into one [`Step`].
//! No socket I/O happens inside `handle`, which keeps the whole state
//! machine testable without process fixtures. [`EventLoop`] marries a
//! dispatcher to a [`UdpTransport`] and adds the two things only a real
//! process needs: the bounded wait and parent-liveness polling.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::ApError;
use crate::process;
use crate::processor::Processor;
use crate::registry::{Registry, SvarKey};
use crate::signal::{Reply, Signal};
use crate::status;
use crate::store::{CoordStore, events};
use crate::transport::UdpTransport;

/// What the loop should do after one dispatched signal.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// Nothing to send.
    None,
    /// Send a reply to the signal's sender.
    Reply(Reply),
    /// Send a reply somewhere else (event forwarding).
    Forward(SocketAddr, Reply),
    /// Terminate the loop.
    Exit,
}

/// Serializes all variable mutation and AP-specific effects.
pub struct Dispatcher {
    registry: Registry,
    processor: Box<dyn Processor>,
    store: Box<dyn CoordStore>,
    identity: String,
    /// Exit once the last coupled variable is retracted.
    auto_exit: bool,
    /// Destination for asynchronous event forwarding, when reporting is
    /// active.
    event_sink: Option<SocketAddr>,
}

impl Dispatcher {
    pub fn new(
        processor: Box<dyn Processor>,
        store: Box<dyn CoordStore>,
        identity: &str,
        auto_exit: bool,
    ) -> Self {
        Self {
            registry: Registry::new(),
            processor,
            store,
            identity: identity.to_string(),
            auto_exit,
            event_sink: None,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn store(&self) -> &dyn CoordStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn CoordStore {
        self.store.as_mut()
    }

    /// Announce this processor to the store before the loop starts.
    pub fn startup(&mut self, pid: u32, port: u16) {
        self.store.register_processor(&self.identity, pid, port);
        info!(identity = %self.identity, pid, port, "processor registered");
    }

    /// Withdraw from the store after the loop ends.
    pub fn shutdown(&mut self) {
        self.store.unregister_processor(&self.identity);
        info!(identity = %self.identity, "processor unregistered");
    }

    /// Dispatch one signal.
    pub fn handle(&mut self, signal: Signal) -> Step {
        match signal {
            Signal::Disconnect => {
                info!("disconnect received");
                Step::Exit
            }
            Signal::NewVariable { key, name } => {
                self.register_variable(key, &name);
                Step::None
            }
            Signal::MakeOffer { key, name } => {
                if !self.processor.accepts(&name) {
                    warn!(%key, %name, "offer for an unacceptable name");
                    return Step::None;
                }
                if self
                    .processor
                    .make_counter_offer(key, self.store.as_mut())
                {
                    self.register_variable(key, &name);
                    let coupling = self.store.match_or_make(key, &self.identity);
                    self.store.set_state(key, false, &self.identity);
                    debug!(%key, %name, ?coupling, "counter-offer made");
                } else {
                    debug!(%key, %name, "counter-offer declined");
                }
                Step::None
            }
            Signal::OfferMatched { key, name } => {
                self.register_variable(key, &name);
                self.store
                    .add_event(events::OFFER_MATCHED, &self.identity, key);
                Step::None
            }
            Signal::RetractOffer { key } => {
                if !self.registry.contains(key) {
                    warn!(%key, "retract for an unknown key");
                    return Step::None;
                }
                self.processor.retract(&mut self.registry, key);
                self.registry.remove(key);
                self.store.set_state(key, false, &self.identity);
                info!(%key, remaining = self.registry.len(), "variable retracted");
                if self.auto_exit && self.registry.is_empty() {
                    info!("last coupled variable retracted, auto-exiting");
                    return Step::Exit;
                }
                Step::None
            }
            Signal::GetValue { key } => {
                let reply = match self.processor.get_value(&self.registry, key) {
                    Ok(bytes) => Reply::ValueIs {
                        status: status::OK,
                        key,
                        bytes,
                    },
                    Err(ApError::NoValue(_)) => Reply::ValueIs {
                        status: status::NO_VALUE,
                        key,
                        bytes: Vec::new(),
                    },
                    Err(e) => {
                        warn!(%key, error = %e, "get-value failed");
                        Reply::ValueIs {
                            status: status::UNKNOWN_KEY,
                            key,
                            bytes: Vec::new(),
                        }
                    }
                };
                Step::Reply(reply)
            }
            Signal::AssignValue { key, bytes } => {
                let code = match self.processor.assign_value(
                    &mut self.registry,
                    key,
                    bytes,
                    self.store.as_mut(),
                ) {
                    Ok(code) => code,
                    Err(ApError::UnknownKey(_)) => status::UNKNOWN_KEY,
                    Err(e) => {
                        warn!(%key, error = %e, "assign-value failed");
                        status::BAD_RECORD
                    }
                };
                Step::Reply(Reply::Assigned { status: code, key })
            }
            Signal::StartEventReporting { port } => {
                let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
                info!(%addr, "event reporting started");
                self.event_sink = Some(addr);
                Step::None
            }
            Signal::StopEventReporting => {
                info!("event reporting stopped");
                self.event_sink = None;
                Step::None
            }
            Signal::NewEvent { kind, key } => match self.event_sink {
                Some(addr) => Step::Forward(addr, Reply::GotEvent { kind, key }),
                None => {
                    debug!(kind, %key, "event dropped, reporting inactive");
                    Step::None
                }
            },
        }
    }

    /// Insert a slot for a newly offered key, running the behavior's
    /// one-time initialization.
    fn register_variable(&mut self, key: SvarKey, name: &str) {
        if !self.processor.accepts(name) {
            warn!(%key, name, "variable name not serviced by this processor");
            return;
        }
        let (var, inserted) = self.registry.insert_if_absent(key, name);
        if !inserted {
            debug!(%key, name, "key already coupled");
            return;
        }
        if let Err(e) = self.processor.initialize(var, self.store.as_mut()) {
            warn!(%key, name, error = %e, "initialization failed, dropping slot");
            self.registry.remove(key);
            return;
        }
        info!(%key, name, "variable coupled");
    }
}

/// The process's only thread of control.
pub struct EventLoop {
    dispatcher: Dispatcher,
    transport: UdpTransport,
    /// Pid of the launching interpreter; loop exits once it dies.
    parent: Option<u32>,
    /// Bound on the wait for the next signal; sets the parent-poll
    /// cadence.
    poll_interval: Duration,
}

impl EventLoop {
    pub fn new(
        dispatcher: Dispatcher,
        transport: UdpTransport,
        parent: Option<u32>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            transport,
            parent,
            poll_interval,
        }
    }

    /// Run until disconnect, auto-exit, or parent death.
    pub async fn run(mut self) -> io::Result<()> {
        let port = self.transport.local_addr()?.port();
        self.dispatcher.startup(std::process::id(), port);
        info!(
            identity = %self.dispatcher.identity(),
            port,
            parent = ?self.parent,
            "event loop running"
        );

        let result = loop {
            match timeout(self.poll_interval, self.transport.recv()).await {
                Err(_) => {
                    if let Some(pid) = self.parent
                        && !process::alive(pid)
                    {
                        info!(pid, "parent process is gone, exiting");
                        break Ok(());
                    }
                }
                Ok(Ok(None)) => {} // undecodable datagram, already logged
                Ok(Ok(Some((signal, from)))) => match self.dispatcher.handle(signal) {
                    Step::None => {}
                    Step::Reply(reply) => {
                        if let Err(e) = self.transport.send(&reply, from).await {
                            warn!(%from, error = %e, "failed to send reply");
                        }
                    }
                    Step::Forward(addr, reply) => {
                        if let Err(e) = self.transport.send(&reply, addr).await {
                            warn!(%addr, error = %e, "failed to forward event");
                        }
                    }
                    Step::Exit => break Ok(()),
                },
                Ok(Err(e)) => {
                    warn!(error = %e, "signal channel receive failed");
                    break Err(e);
                }
            }
        };

        self.dispatcher.shutdown();
        info!("event loop stopped");
        result
    }
}
