//! Message types sent from the capture session to the host

use serde::Serialize;

use crate::mrz::MrzDocument;
use crate::session::{ErrorKind, SessionState};

/// Messages sent from a capture session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved between lifecycle states
    StateChanged { from: SessionState, to: SessionState },
    /// The pipeline produced a record for prefill
    Scanned {
        document: MrzDocument,
        /// OCR output the record was parsed from
        raw_text: String,
    },
    /// The session entered `Errored`
    Failed { kind: ErrorKind, message: String },
}
