//! Session engine for the V8 native and WebInspector debug protocols.
//!
//! A [`Session`] stamps outgoing commands with ids from a shared
//! [`SequenceGenerator`], correlates responses with their pending calls, and
//! routes events to per-name processors. Payloads are bound through a
//! [`jsdebug_protocol::Binder`]; replies tied to a [`ContextToken`] are
//! dropped once the debuggee has resumed.

mod config;
mod context;
mod dialect;
mod error;
mod handles;
mod protocol;
pub mod schema;
mod seq;
mod session;
mod stream;
mod transcript;
mod transport;

pub use config::{SessionConfig, PROTOCOL_LOG_ENV};
pub use context::{ContextToken, ContextTracker};
pub use dialect::{Dialect, EventFrame, Incoming, Lifecycle, RemoteError, ResponseFrame};
pub use error::{CallFailure, ConfigError, FrameError, SessionError, TransportError};
pub use handles::HandleTable;
pub use protocol::{
    BacktraceArguments, CommandArguments, ContinueArguments, EvaluateArguments,
    EvaluateOnCallFrameArguments, LookupArguments, OutgoingCommand, ResumeArguments,
    RuntimeEvaluateArguments, ScopeArguments, StepAction,
};
pub use seq::SequenceGenerator;
pub use session::{BusyStatus, CallHandle, Callbacks, EventView, Reply, Session, SessionState};
pub use stream::{
    connect, read_message, write_message, Endpoint, StreamSource, StreamTransport, MAX_FRAME_BYTES,
};
pub use transcript::ProtocolLog;
pub use transport::{
    memory_transport, FrameSource, MemoryPeer, MemorySource, MemoryTransport, Transport,
};
