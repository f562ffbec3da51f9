#[macro_use]
pub mod logging;

pub mod error;
pub mod io;
pub mod record;
pub mod session;
pub mod settings;
pub mod sink;

pub use error::{DecodeError, SessionError, SettingsError, TransportError};
pub use io::serial::{LineFramer, RawBuffer, TextEncoding};
pub use io::{ByteSource, PacingPolicy, ReadOutcome, StreamEndReason};
pub use record::{decode_line, Record, RecordFormat};
pub use session::{run_session, SessionConfig, SessionHandle, SessionReport, SessionSummary};
pub use sink::{DecodedSeries, JsonLinesSink, RecordSink};
