use serde::{Deserialize, Serialize};

use super::{ColumnId, ProcessId};

/// Inclusive 1-based character range of a key column
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubstringRange {
    pub from: u32,
    pub to: u32,
}

impl SubstringRange {
    pub fn length(&self) -> u32 {
        self.to.saturating_sub(self.from) + 1
    }

    pub fn is_valid(&self) -> bool {
        self.from >= 1 && self.to >= self.from
    }
}

/// One join-key pair on a trace edge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceKey {
    pub self_column_id: ColumnId,
    #[serde(default)]
    pub self_substr: Option<SubstringRange>,
    pub target_column_id: ColumnId,
    #[serde(default)]
    pub target_substr: Option<SubstringRange>,
    /// Minutes; when set both columns must be temporal and the join bounds
    /// them to less than this far apart
    #[serde(default)]
    pub delta_time: Option<i64>,
    /// One-sided rolling window instead of a symmetric band
    #[serde(default)]
    pub cut_off: bool,
}

impl TraceKey {
    pub fn new(self_column_id: ColumnId, target_column_id: ColumnId) -> Self {
        Self {
            self_column_id,
            self_substr: None,
            target_column_id,
            target_substr: None,
            delta_time: None,
            cut_off: false,
        }
    }
}

/// A configured link between two processes.
///
/// Stored once; traversed in either direction. `self` is the upstream side
/// when walking in the directed sense.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEdge {
    pub self_process_id: ProcessId,
    pub target_process_id: ProcessId,
    pub keys: Vec<TraceKey>,
}

impl TraceEdge {
    pub fn new(self_process_id: ProcessId, target_process_id: ProcessId, keys: Vec<TraceKey>) -> Self {
        Self {
            self_process_id,
            target_process_id,
            keys,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.self_process_id == self.target_process_id
    }
}
