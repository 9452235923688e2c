//! Command/response/event dispatcher.
//! - send: stamp a command, register the pending call, hand the frame to the transport
//! - on_frame_received: responses go to their pending call, events to their processor
//! - close: fail every pending call exactly once, then stop accepting commands

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver};
use indexmap::IndexMap;
use jsdebug_protocol::{BindMode, Binder, BoundView, ResolutionError, ResolvedView, TypeId};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::context::{ContextToken, ContextTracker};
use crate::dialect::{Dialect, EventFrame, Incoming, Lifecycle, ResponseFrame};
use crate::error::{CallFailure, FrameError, SessionError};
use crate::handles::HandleTable;
use crate::protocol::OutgoingCommand;
use crate::seq::SequenceGenerator;
use crate::transcript::ProtocolLog;
use crate::transport::{FrameSource, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    /// Pending calls are being failed; new commands are rejected.
    Closing,
    Closed,
}

/// A successful response, bound against the command's result type.
#[derive(Debug, Clone)]
pub struct Reply {
    seq: u64,
    command: SmolStr,
    raw: Arc<Value>,
    view: Option<BoundView>,
    variant: Option<ResolvedView>,
}

impl Reply {
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Response body as received.
    #[must_use]
    pub fn raw(&self) -> &Arc<Value> {
        &self.raw
    }

    /// Bound body; `None` when the command declared no result type.
    #[must_use]
    pub fn view(&self) -> Option<&BoundView> {
        self.view.as_ref()
    }

    /// Set when the result type is polymorphic.
    #[must_use]
    pub fn variant(&self) -> Option<&ResolvedView> {
        self.variant.as_ref()
    }
}

/// An event payload bound against its processor's registered type.
#[derive(Debug, Clone)]
pub struct EventView {
    name: SmolStr,
    raw: Arc<Value>,
    view: BoundView,
    variant: Option<ResolvedView>,
}

impl EventView {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn raw(&self) -> &Arc<Value> {
        &self.raw
    }

    #[must_use]
    pub fn view(&self) -> &BoundView {
        &self.view
    }

    #[must_use]
    pub fn variant(&self) -> Option<&ResolvedView> {
        self.variant.as_ref()
    }
}

type SuccessFn = Box<dyn FnOnce(Reply) + Send>;
type FailureFn = Box<dyn FnOnce(CallFailure) + Send>;

/// Completion callbacks of one call; exactly one of them runs, at most once.
///
/// Callbacks run on the session's reader thread in wire order. They may call
/// `send` (outgoing frames go through a channel), but must not block: slow
/// work belongs on another thread, see [`Callbacks::channel`].
pub struct Callbacks {
    on_success: SuccessFn,
    on_failure: FailureFn,
}

impl Callbacks {
    pub fn new(
        on_success: impl FnOnce(Reply) + Send + 'static,
        on_failure: impl FnOnce(CallFailure) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    #[must_use]
    pub fn ignore() -> Self {
        Self::new(|_| {}, |_| {})
    }

    /// Callbacks that forward the outcome to a channel.
    #[must_use]
    pub fn channel() -> (Self, Receiver<Result<Reply, CallFailure>>) {
        let (sender, receiver) = bounded(1);
        let failure_sender = sender.clone();
        let callbacks = Self::new(
            move |reply| {
                let _ = sender.send(Ok(reply));
            },
            move |failure| {
                let _ = failure_sender.send(Err(failure));
            },
        );
        (callbacks, receiver)
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

/// Which calls are still waiting for a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusyStatus {
    /// Command name of the oldest pending call.
    pub oldest: Option<SmolStr>,
    /// Number of pending calls besides the oldest.
    pub others: usize,
}

impl BusyStatus {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.oldest.is_none()
    }
}

impl fmt::Display for BusyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.oldest, self.others) {
            (None, _) => f.write_str("idle"),
            (Some(oldest), 0) => write!(f, "waiting for reply to {oldest}"),
            (Some(oldest), others) => write!(f, "waiting for reply to {oldest} and {others} more"),
        }
    }
}

struct PendingCall {
    command: SmolStr,
    result_type: Option<TypeId>,
    token: Option<ContextToken>,
    callbacks: Callbacks,
    created: Instant,
}

struct PendingTable {
    state: SessionState,
    /// Insertion order is issuance order.
    calls: IndexMap<u64, PendingCall>,
}

impl PendingTable {
    fn busy_status(&self) -> BusyStatus {
        match self.calls.values().next() {
            Some(oldest) => BusyStatus {
                oldest: Some(oldest.command.clone()),
                others: self.calls.len() - 1,
            },
            None => BusyStatus::default(),
        }
    }
}

type EventHandler = Arc<dyn Fn(EventView) + Send + Sync>;
type StatusListener = Arc<dyn Fn(&BusyStatus) + Send + Sync>;

#[derive(Clone)]
struct EventProcessor {
    type_id: TypeId,
    handler: EventHandler,
}

struct SessionInner {
    dialect: Dialect,
    binder: Binder,
    response_mode: BindMode,
    event_mode: BindMode,
    transport: Arc<dyn Transport>,
    sequence: Arc<SequenceGenerator>,
    handles: HandleTable,
    context: ContextTracker,
    pending: Mutex<PendingTable>,
    processors: RwLock<FxHashMap<SmolStr, EventProcessor>>,
    status_listener: RwLock<Option<StatusListener>>,
    transcript: Option<ProtocolLog>,
}

/// One debug connection. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.inner.dialect)
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a connected session over `transport`.
    ///
    /// `sequence` may be shared between sessions so ids stay unique across reconnects.
    pub fn new(
        config: &SessionConfig,
        binder: Binder,
        transport: Arc<dyn Transport>,
        sequence: Arc<SequenceGenerator>,
    ) -> Result<Self, SessionError> {
        let transcript = match &config.protocol_log {
            Some(path) => Some(ProtocolLog::open(path).map_err(|source| {
                SessionError::Transcript {
                    path: path.clone(),
                    source,
                }
            })?),
            None => None,
        };
        Ok(Self {
            inner: Arc::new(SessionInner {
                dialect: config.dialect,
                binder: binder.with_ambiguity(config.ambiguity),
                response_mode: config.response_mode,
                event_mode: config.event_mode,
                transport,
                sequence,
                handles: HandleTable::new(),
                context: ContextTracker::new(),
                pending: Mutex::new(PendingTable {
                    state: SessionState::Connected,
                    calls: IndexMap::new(),
                }),
                processors: RwLock::new(FxHashMap::default()),
                status_listener: RwLock::new(None),
                transcript,
            }),
        })
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.inner.dialect
    }

    #[must_use]
    pub fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    #[must_use]
    pub fn handles(&self) -> &HandleTable {
        &self.inner.handles
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.pending.lock().state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().calls.len()
    }

    /// Token of the current suspend episode, if the debuggee is suspended.
    #[must_use]
    pub fn current_context(&self) -> Option<ContextToken> {
        self.inner.context.current()
    }

    /// Marks the debuggee suspended, for transports that report it out of band.
    pub fn suspend(&self) -> ContextToken {
        self.inner.suspend()
    }

    /// Marks the debuggee running: the current token is dismissed and handles are dropped.
    pub fn resume(&self) {
        self.inner.apply(Lifecycle::Resume);
    }

    #[must_use]
    pub fn busy_status(&self) -> BusyStatus {
        self.inner.pending.lock().busy_status()
    }

    /// Called with the new status whenever a call is added or completed.
    pub fn set_status_listener(&self, listener: impl Fn(&BusyStatus) + Send + Sync + 'static) {
        *self.inner.status_listener.write() = Some(Arc::new(listener));
    }

    /// Routes events named `name` to `handler`, with payloads bound as `type_id`.
    pub fn on_event(
        &self,
        name: impl Into<SmolStr>,
        type_id: impl Into<TypeId>,
        handler: impl Fn(EventView) + Send + Sync + 'static,
    ) -> Result<(), SessionError> {
        let type_id = type_id.into();
        if self.inner.binder.describe(type_id.as_str()).is_none() {
            return Err(SessionError::UnknownType(type_id));
        }
        self.inner.processors.write().insert(
            name.into(),
            EventProcessor {
                type_id,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Sends `command` without waiting for its reply.
    ///
    /// With a `token`, the command fails with [`SessionError::ContextDismissed`]
    /// unless the token is current, and its reply is dropped silently if the
    /// token has been dismissed by the time it arrives. On `Err` neither
    /// callback runs.
    pub fn send(
        &self,
        command: OutgoingCommand,
        callbacks: Callbacks,
        token: Option<ContextToken>,
    ) -> Result<CallHandle, SessionError> {
        let inner = &*self.inner;
        let result = match token {
            Some(token) => inner
                .context
                .with_current(Some(token), || {
                    inner.dispatch(command, callbacks, Some(token))
                })
                .ok_or(SessionError::ContextDismissed(token))?,
            None => inner.dispatch(command, callbacks, None),
        };
        self.finish_send(result)
    }

    /// Sends `command` and dismisses `token` in one step.
    ///
    /// Used for commands that resume the debuggee: nothing else can be sent
    /// with `token` once this returns. The reply itself is not tied to `token`.
    pub fn send_and_invalidate(
        &self,
        command: OutgoingCommand,
        callbacks: Callbacks,
        token: ContextToken,
    ) -> Result<CallHandle, SessionError> {
        let inner = &*self.inner;
        let result = inner
            .context
            .invalidate_with(token, || inner.dispatch(command, callbacks, None))
            .ok_or(SessionError::ContextDismissed(token))?;
        inner.handles.reset();
        self.finish_send(result)
    }

    /// Sends `command`; the outcome is delivered to the returned receiver.
    ///
    /// A stale reply closes the channel without a value.
    pub fn send_with_reply(
        &self,
        command: OutgoingCommand,
        token: Option<ContextToken>,
    ) -> Result<(CallHandle, Receiver<Result<Reply, CallFailure>>), SessionError> {
        let (callbacks, receiver) = Callbacks::channel();
        let handle = self.send(command, callbacks, token)?;
        Ok((handle, receiver))
    }

    fn finish_send(&self, result: Result<u64, SessionError>) -> Result<CallHandle, SessionError> {
        match result {
            Ok(seq) => {
                self.inner.notify_status();
                Ok(CallHandle {
                    seq,
                    session: Arc::downgrade(&self.inner),
                })
            }
            Err(SessionError::Transport(err)) => {
                self.inner.close(&format!("transport failure: {err}"));
                Err(SessionError::Transport(err))
            }
            Err(err) => Err(err),
        }
    }

    /// Handles one deframed incoming message.
    ///
    /// Malformed or unrecognized frames are logged and dropped.
    pub fn on_frame_received(&self, frame: &str) {
        let inner = &*self.inner;
        if inner.pending.lock().state == SessionState::Closed {
            debug!("dropping frame received after close");
            return;
        }
        if let Some(log) = &inner.transcript {
            log.incoming(frame);
        }
        let raw: Value = match serde_json::from_str(frame).map_err(FrameError::from) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "dropping malformed frame");
                return;
            }
        };
        let response_seq = inner.dialect.response_seq(&raw);
        match inner.dialect.classify(&inner.binder, raw) {
            Ok(Incoming::Response(response)) => inner.deliver_response(response),
            Ok(Incoming::Event(event)) => inner.deliver_event(event),
            Err(err) => match response_seq {
                Some(seq) => inner.deliver_malformed_response(seq, err),
                None => warn!(%err, "dropping unrecognized frame"),
            },
        }
    }

    /// Fails every pending call and closes the session.
    pub fn on_transport_closed(&self, reason: &str) {
        if self.state() == SessionState::Connected {
            warn!(reason, "transport closed");
        }
        self.inner.close(reason);
    }

    /// Fails every pending call with [`CallFailure::ConnectionClosed`]; later calls are no-ops.
    pub fn close(&self, reason: &str) {
        self.inner.close(reason);
    }

    /// Pulls frames from `source` on a dedicated thread until it ends or the session closes.
    pub fn spawn_reader<S: FrameSource + 'static>(&self, mut source: S) -> JoinHandle<()> {
        let session = self.clone();
        thread::spawn(move || loop {
            let next = panic::catch_unwind(AssertUnwindSafe(|| source.next_frame()));
            let Ok(next) = next else {
                error!("frame source panicked");
                session.on_transport_closed("transport failure: frame source panicked");
                break;
            };
            match next {
                Ok(Some(frame)) => {
                    session.on_frame_received(&frame);
                    if session.is_closed() {
                        break;
                    }
                }
                Ok(None) => {
                    session.on_transport_closed("end of stream");
                    break;
                }
                Err(err) => {
                    error!(%err, "transport read failed");
                    session.on_transport_closed(&format!("transport failure: {err}"));
                    break;
                }
            }
        })
    }
}

impl SessionInner {
    fn dispatch(
        &self,
        command: OutgoingCommand,
        callbacks: Callbacks,
        token: Option<ContextToken>,
    ) -> Result<u64, SessionError> {
        if let Some(result_type) = command.result_type() {
            if self.binder.describe(result_type.as_str()).is_none() {
                return Err(SessionError::UnknownType(result_type.clone()));
            }
        }
        let (seq, frame) = {
            let mut pending = self.pending.lock();
            if pending.state != SessionState::Connected {
                return Err(SessionError::Closed);
            }
            let seq = self.sequence.next();
            let frame =
                self.dialect
                    .encode(seq, &command)
                    .map_err(|source| SessionError::Encode {
                        command: command.name().clone(),
                        source,
                    })?;
            pending.calls.insert(
                seq,
                PendingCall {
                    command: command.name().clone(),
                    result_type: command.result_type().cloned(),
                    token,
                    callbacks,
                    created: Instant::now(),
                },
            );
            (seq, frame)
        };

        debug!(seq, command = %command.name(), "sending command");
        if let Some(log) = &self.transcript {
            log.outgoing(&frame);
        }
        if let Err(err) = self.transport.send_frame(frame) {
            error!(seq, %err, "failed to send command");
            if self.pending.lock().calls.shift_remove(&seq).is_some() {
                return Err(SessionError::Transport(err));
            }
            // close() already drained the call and failed it
            debug!(seq, "send failed after the session closed");
        }
        Ok(seq)
    }

    fn deliver_response(&self, response: ResponseFrame) {
        let lifecycle = self.dialect.response_lifecycle(&response);
        let ResponseFrame {
            seq, outcome, refs, ..
        } = response;
        let call = self.pending.lock().calls.shift_remove(&seq);
        let Some(call) = call else {
            debug!(seq, "response for unknown call");
            return;
        };
        let stale = self.is_stale(&call);
        if !stale {
            self.handles.put_all(refs);
        }
        if let Some(lifecycle) = lifecycle {
            self.apply(lifecycle);
        }

        debug!(
            seq,
            command = %call.command,
            elapsed_ms = %call.created.elapsed().as_millis(),
            "response received"
        );
        self.notify_status();
        if stale {
            debug!(seq, command = %call.command, "dropping stale response");
            return;
        }

        let outcome = match outcome {
            Ok(body) => self.reply(seq, &call, body),
            Err(remote) => Err(CallFailure::Remote {
                code: remote.code,
                message: remote.message,
            }),
        };
        let callbacks = call.callbacks;
        run_callback(&call.command, move || match outcome {
            Ok(reply) => (callbacks.on_success)(reply),
            Err(failure) => (callbacks.on_failure)(failure),
        });
    }

    /// Fails the call a response belongs to when the response itself cannot be decoded.
    fn deliver_malformed_response(&self, seq: u64, err: FrameError) {
        let failure = match err {
            FrameError::Malformed(err) | FrameError::Unrecognized(ResolutionError::Binding(err)) => {
                CallFailure::Binding(err)
            }
            FrameError::Unrecognized(err) => CallFailure::Resolution(err),
            err => {
                warn!(seq, %err, "dropping unrecognized frame");
                return;
            }
        };
        let call = self.pending.lock().calls.shift_remove(&seq);
        let Some(call) = call else {
            warn!(seq, %failure, "dropping malformed response for unknown call");
            return;
        };
        self.notify_status();
        if self.is_stale(&call) {
            debug!(seq, command = %call.command, "dropping stale malformed response");
            return;
        }
        warn!(seq, command = %call.command, %failure, "malformed response");
        let callbacks = call.callbacks;
        run_callback(&call.command, move || (callbacks.on_failure)(failure));
    }

    fn is_stale(&self, call: &PendingCall) -> bool {
        call.token.is_some_and(|token| !self.context.is_current(token))
    }

    fn reply(&self, seq: u64, call: &PendingCall, body: Value) -> Result<Reply, CallFailure> {
        let raw = Arc::new(body);
        let (view, variant) = match &call.result_type {
            Some(type_id) => {
                let (view, variant) =
                    self.bind_payload(Arc::clone(&raw), type_id, self.response_mode)?;
                (Some(view), variant)
            }
            None => (None, None),
        };
        Ok(Reply {
            seq,
            command: call.command.clone(),
            raw,
            view,
            variant,
        })
    }

    fn deliver_event(&self, event: EventFrame) {
        if let Some(lifecycle) = self.dialect.event_lifecycle(&event.name) {
            self.apply(lifecycle);
        }
        let processor = self.processors.read().get(event.name.as_str()).cloned();
        let Some(processor) = processor else {
            warn!(event = %event.name, "dropping unrecognized event");
            return;
        };
        // events without a payload bind as an empty record
        let raw = Arc::new(match event.body {
            Value::Null => Value::Object(Map::new()),
            body => body,
        });
        match self.bind_payload(Arc::clone(&raw), &processor.type_id, self.event_mode) {
            Ok((view, variant)) => {
                let view = EventView {
                    name: event.name.clone(),
                    raw,
                    view,
                    variant,
                };
                let handler = processor.handler;
                run_callback(&event.name, move || handler(view));
            }
            Err(err) => warn!(event = %event.name, %err, "dropping event with malformed payload"),
        }
    }

    /// Binds a payload, narrowing it first when `type_id` is polymorphic.
    fn bind_payload(
        &self,
        raw: Arc<Value>,
        type_id: &TypeId,
        mode: BindMode,
    ) -> Result<(BoundView, Option<ResolvedView>), CallFailure> {
        let Some(schema) = self.binder.describe(type_id.as_str()) else {
            return self
                .binder
                .bind_type(raw, type_id.as_str(), mode)
                .map(|view| (view, None))
                .map_err(CallFailure::from);
        };
        if schema.subtypes.is_some() {
            let resolved = self.binder.resolve(raw, schema, mode)?;
            Ok((resolved.view().clone(), Some(resolved)))
        } else {
            Ok((self.binder.bind(raw, schema, mode)?, None))
        }
    }

    fn suspend(&self) -> ContextToken {
        let token = self.context.suspend();
        debug!(%token, "debuggee suspended");
        token
    }

    fn apply(&self, lifecycle: Lifecycle) {
        match lifecycle {
            Lifecycle::Suspend => {
                self.suspend();
            }
            Lifecycle::Resume => {
                if let Some(token) = self.context.resume() {
                    debug!(%token, "debuggee resumed");
                }
                self.handles.reset();
            }
        }
    }

    fn close(&self, reason: &str) {
        let drained = {
            let mut pending = self.pending.lock();
            if pending.state != SessionState::Connected {
                return;
            }
            pending.state = SessionState::Closing;
            std::mem::take(&mut pending.calls)
        };
        info!(reason, pending = drained.len(), "closing session");
        let reason = SmolStr::new(reason);
        for (seq, call) in drained {
            debug!(seq, command = %call.command, "failing pending call");
            let failure = CallFailure::ConnectionClosed {
                reason: reason.clone(),
            };
            let callbacks = call.callbacks;
            run_callback(&call.command, move || (callbacks.on_failure)(failure));
        }
        self.pending.lock().state = SessionState::Closed;
        self.apply(Lifecycle::Resume);
        self.transport.close();
        self.notify_status();
    }

    fn notify_status(&self) {
        let listener = self.status_listener.read().clone();
        if let Some(listener) = listener {
            let status = self.pending.lock().busy_status();
            listener(&status);
        }
    }
}

fn run_callback(label: &str, callback: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(callback = label, "callback panicked");
    }
}

/// Refers to one issued call.
///
/// Individual calls cannot be cancelled; [`CallHandle::close_session`] closes
/// the whole session, failing every pending call.
#[derive(Debug, Clone)]
pub struct CallHandle {
    seq: u64,
    session: Weak<SessionInner>,
}

impl CallHandle {
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether the call still waits for its reply.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.session
            .upgrade()
            .is_some_and(|inner| inner.pending.lock().calls.contains_key(&self.seq))
    }

    pub fn close_session(&self, reason: &str) {
        if let Some(inner) = self.session.upgrade() {
            inner.close(reason);
        }
    }
}
