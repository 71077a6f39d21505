//! Async reader client.
//!
//! One Tokio task per reader owns the socket, the framed codec and the
//! [`Session`] machine; it is the sole mutator of session state. The task
//! wakes on inbound frames, consumer commands and timers (the post-connect
//! settle delay, the pre-Ready read timeout, the reconnect backoff and the
//! shutdown grace window).
//!
//! ```text
//! ReaderClient::connect(config)
//!     │
//!     ├─> ReaderHandle ──(commands)──┐
//!     │                              v
//!     └─> mpsc::Receiver <──(events)── session task ──(TCP)── FX9600
//!                                          │
//!                                          └─> Framed<TcpStream, LlrpCodec>
//! ```
//!
//! Events are delivered over a bounded channel: a consumer that stops
//! draining it backpressures the task before any further inbound bytes are
//! processed, which is what keeps observation delivery lossless in order.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use taglink_core::constants::{CAPABILITIES_DELAY_MS, SHUTDOWN_GRACE_MS, STARTUP_TIMEOUT_MS};
use taglink_core::{Error, ReaderEvent, Result};
use taglink_protocol::{LlrpCodec, LlrpMessage};

use crate::config::ReaderConfig;
use crate::session::{Intent, Session};

/// Capacity of the consumer event channel. Large enough to ride out
/// bursts of tag reports, small enough that a stalled consumer applies
/// backpressure quickly.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 8;

type ReaderFramed = Framed<TcpStream, LlrpCodec>;

/// Commands accepted by the session task.
#[derive(Debug)]
enum Command {
    /// Stop the session and end the task.
    Disconnect,

    /// Stop the current session and restart it with a new antenna plan.
    Reconfigure {
        antennas: BTreeSet<u16>,
        power_dbm: BTreeMap<u16, f32>,
    },
}

/// How a single session ended, deciding what the outer loop does next.
enum SessionOutcome {
    /// The consumer asked for a shutdown; the task ends.
    Shutdown,

    /// The consumer reconfigured the session; restart immediately.
    Reconfigured,

    /// The session failed; reconnect after backoff if enabled.
    Failed(Error),
}

/// Handle for sending commands to a running reader session.
///
/// Cloneable; all clones address the same session task. Dropping the last
/// handle closes the command channel, which the task treats as a
/// disconnect request.
#[derive(Debug, Clone)]
pub struct ReaderHandle {
    commands: mpsc::Sender<Command>,
}

impl ReaderHandle {
    /// Request a graceful shutdown: CLOSE_CONNECTION is sent, the socket
    /// destroyed within the grace window, and the task ends.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect).await;
    }

    /// Replace the antenna plan. Forces a stop and reconnect: the running
    /// ROSpec belongs to the old configuration and cannot be patched in
    /// place.
    pub async fn reconfigure(
        &self,
        antennas: BTreeSet<u16>,
        power_dbm: BTreeMap<u16, f32>,
    ) -> Result<()> {
        if antennas.is_empty() {
            return Err(Error::Config(
                "at least one antenna must be configured".to_string(),
            ));
        }
        self.commands
            .send(Command::Reconfigure {
                antennas,
                power_dbm,
            })
            .await
            .map_err(|_| Error::Config("reader session task has ended".to_string()))
    }
}

/// Entry point for driving a reader.
pub struct ReaderClient;

impl ReaderClient {
    /// Validate the configuration, spawn the session task and begin
    /// connecting. Events (including the initial `Connected`) arrive on
    /// the returned receiver.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid. Connection
    /// failures are not errors here; they surface as `Disconnected` and
    /// `Error` events and are retried per the reconnect policy.
    ///
    /// # Example
    /// ```no_run
    /// use taglink_client::{ReaderClient, ReaderConfig};
    /// use taglink_core::ReaderEvent;
    ///
    /// # async fn example() -> taglink_core::Result<()> {
    /// let config = ReaderConfig::new("192.168.0.40").with_antennas([1, 2]);
    /// let (handle, mut events) = ReaderClient::connect(config)?;
    ///
    /// while let Some(event) = events.recv().await {
    ///     match event {
    ///         ReaderEvent::Tag(observation) => println!("{observation}"),
    ///         ReaderEvent::Ready => println!("streaming"),
    ///         _ => {}
    ///     }
    /// }
    ///
    /// handle.disconnect().await;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect(config: ReaderConfig) -> Result<(ReaderHandle, mpsc::Receiver<ReaderEvent>)> {
        config.validate()?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        tokio::spawn(run_reader(config, command_rx, event_tx));

        Ok((
            ReaderHandle {
                commands: command_tx,
            },
            event_rx,
        ))
    }
}

/// Outer session loop: run sessions until shutdown, reconnecting with
/// backoff after failures.
async fn run_reader(
    config: ReaderConfig,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<ReaderEvent>,
) {
    let mut session = Session::new(config);

    loop {
        session.reset();
        let outcome = run_session(&mut session, &mut commands, &events).await;

        emit(&events, ReaderEvent::Disconnected).await;

        match outcome {
            SessionOutcome::Shutdown => break,
            SessionOutcome::Reconfigured => {
                info!("restarting session with new configuration");
            }
            SessionOutcome::Failed(error) => {
                warn!(kind = error.kind(), %error, "reader session ended");
                emit(
                    &events,
                    ReaderEvent::Error {
                        kind: error.kind(),
                        detail: error.to_string(),
                    },
                )
                .await;

                if !session.config().enable_reconnect {
                    break;
                }

                let backoff = session.config().reconnect_interval;
                debug!(delay_ms = backoff.as_millis() as u64, "reconnect backoff");
                tokio::select! {
                    _ = time::sleep(backoff) => {}
                    command = commands.recv() => match command {
                        None | Some(Command::Disconnect) => break,
                        Some(Command::Reconfigure { antennas, power_dbm }) => {
                            session.reconfigure(antennas, power_dbm);
                        }
                    },
                }
            }
        }
    }

    debug!("reader session task exiting");
}

/// Run one TCP session from connect to teardown.
async fn run_session(
    session: &mut Session,
    commands: &mut mpsc::Receiver<Command>,
    events: &mpsc::Sender<ReaderEvent>,
) -> SessionOutcome {
    let addr = session.config().addr();
    info!(%addr, "connecting to reader");

    let startup_timeout = Duration::from_millis(STARTUP_TIMEOUT_MS);
    let stream = match time::timeout(startup_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(error)) => return SessionOutcome::Failed(error.into()),
        Err(_) => return SessionOutcome::Failed(Error::ConnectTimeout),
    };

    // Tag observations should reach the consumer with wire latency, not
    // Nagle latency.
    if let Err(error) = stream.set_nodelay(true) {
        warn!(%error, "failed to set TCP_NODELAY");
    }

    let mut framed = Framed::new(stream, LlrpCodec::new());

    let intents = session.on_connected();
    if let Err(error) = apply_intents(&mut framed, events, intents).await {
        return SessionOutcome::Failed(error);
    }

    // Settle window: the FX9600 pushes a READER_EVENT_NOTIFICATION right
    // after accept and answers capabilities more reliably once it has.
    // Inbound traffic during the window is dispatched normally.
    let settle = time::sleep(Duration::from_millis(CAPABILITIES_DELAY_MS));
    tokio::pin!(settle);
    loop {
        tokio::select! {
            _ = &mut settle => break,
            inbound = framed.next() => {
                match lift(inbound) {
                    Ok(message) => {
                        if let Err(error) = dispatch(session, &mut framed, events, message).await {
                            return SessionOutcome::Failed(error);
                        }
                    }
                    Err(error) => return SessionOutcome::Failed(error),
                }
            }
        }
    }

    let intents = session.request_capabilities();
    if let Err(error) = apply_intents(&mut framed, events, intents).await {
        return SessionOutcome::Failed(error);
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Disconnect) => {
                    graceful_close(session, &mut framed, events).await;
                    return SessionOutcome::Shutdown;
                }
                Some(Command::Reconfigure { antennas, power_dbm }) => {
                    session.reconfigure(antennas, power_dbm);
                    graceful_close(session, &mut framed, events).await;
                    return SessionOutcome::Reconfigured;
                }
            },
            inbound = next_message(&mut framed, session.rospec_started()) => {
                match inbound {
                    Ok(message) => {
                        if let Err(error) = dispatch(session, &mut framed, events, message).await {
                            return SessionOutcome::Failed(error);
                        }
                    }
                    Err(error) => return SessionOutcome::Failed(error),
                }
            }
        }
    }
}

/// Await the next inbound message. Before the session is Ready a 30 s
/// read timeout surfaces dead hosts; afterwards liveness is inferred from
/// KEEPALIVE traffic and no timeout applies.
async fn next_message(framed: &mut ReaderFramed, started: bool) -> Result<LlrpMessage> {
    if started {
        lift(framed.next().await)
    } else {
        match time::timeout(Duration::from_millis(STARTUP_TIMEOUT_MS), framed.next()).await {
            Ok(inbound) => lift(inbound),
            Err(_) => Err(Error::ConnectTimeout),
        }
    }
}

/// Collapse the stream item into the session's error space; end-of-stream
/// means the reader closed on us.
fn lift(inbound: Option<Result<LlrpMessage>>) -> Result<LlrpMessage> {
    match inbound {
        Some(Ok(message)) => Ok(message),
        Some(Err(error)) => Err(error),
        None => Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "reader closed the connection",
        ))),
    }
}

/// Feed one message through the machine and apply the resulting intents.
async fn dispatch(
    session: &mut Session,
    framed: &mut ReaderFramed,
    events: &mpsc::Sender<ReaderEvent>,
    message: LlrpMessage,
) -> Result<()> {
    trace!(%message, state = session.state().name(), "inbound");
    let intents = session.handle_message(&message)?;
    apply_intents(framed, events, intents).await
}

/// Apply intents in order: sends flush to the socket, events go to the
/// consumer channel. The bounded channel send is the backpressure point:
/// no further inbound processing happens until the consumer accepts the
/// event.
async fn apply_intents(
    framed: &mut ReaderFramed,
    events: &mpsc::Sender<ReaderEvent>,
    intents: Vec<Intent>,
) -> Result<()> {
    for intent in intents {
        match intent {
            Intent::Send(message) => {
                trace!(%message, "outbound");
                framed.send(message).await?;
            }
            Intent::Emit(event) => emit(events, event).await,
        }
    }
    Ok(())
}

async fn emit(events: &mpsc::Sender<ReaderEvent>, event: ReaderEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver dropped; discarding event");
    }
}

/// Graceful teardown: notify the reader, then destroy the socket. The
/// grace window is an upper bound on each step, not a wait; socket
/// destruction is idempotent and a dead peer must not stall shutdown.
async fn graceful_close(
    session: &mut Session,
    framed: &mut ReaderFramed,
    events: &mpsc::Sender<ReaderEvent>,
) {
    let grace = Duration::from_millis(SHUTDOWN_GRACE_MS);
    let intents = session.begin_shutdown();

    match time::timeout(grace, apply_intents(framed, events, intents)).await {
        Ok(Ok(())) => debug!("close notification sent"),
        Ok(Err(error)) => debug!(%error, "failed to send close notification"),
        Err(_) => warn!(grace_ms = grace.as_millis() as u64, "close notification timed out"),
    }

    match time::timeout(grace, framed.get_mut().shutdown()).await {
        Ok(Ok(())) => debug!("socket shut down"),
        Ok(Err(error)) => debug!(%error, "error during socket shutdown"),
        Err(_) => warn!(grace_ms = grace.as_millis() as u64, "socket shutdown timed out"),
    }
}
