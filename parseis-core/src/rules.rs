// Copyright (C) 2024 by GiGa infosystems
//! Declarative rules mapping semantic trace keys to header byte positions.
//!
//! SEG-Y trace headers are routinely repurposed by geophysicists, so the
//! mapping from a semantic key (source x, inline number, ...) to a byte
//! position is data, not code. A [`RuleSet`] holds one rule per enabled key;
//! the standard SEG-Y rev1 positions are the defaults and any rule can be
//! re-pointed at a custom location.
//!
//! Byte locations are stored 1-based, as the SEG-Y standard documents them;
//! the marshalling code subtracts one.
use fnv::FnvHashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::segy::trace_header_byte as thb;
use crate::TRACE_HEADER_LEN;

/// The available trace metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceKey {
    /// Buffer the whole 240-byte header. Don't interpret it.
    Copy,
    /// Local trace number.
    Ltn,
    /// Global trace number.
    Gtn,
    /// Trace sequence number within the line.
    LineTraceNum,
    /// Trace sequence number within the file.
    FileTraceNum,
    /// Original field record number.
    FieldRecordNum,
    /// Ensemble number.
    EnsembleNum,
    /// Number of samples in this trace.
    Ns,
    /// Sample interval of this trace.
    SampleInterval,
    /// Distance from source to receiver.
    Offset,
    /// The source x coordinate.
    SourceX,
    /// The source y coordinate.
    SourceY,
    /// The receiver x coordinate.
    ReceiverX,
    /// The receiver y coordinate.
    ReceiverY,
    /// The CDP x coordinate.
    CdpX,
    /// The CDP y coordinate.
    CdpY,
    /// The inline number.
    Inline,
    /// The crossline number.
    Crossline,
    /// The coordinate scalar.
    CoordinateScalar,
    /// The source/receiver dissimilarity of a matched trace pair.
    Dsdr,
}

/// How a key is stored in the columnar metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StorageClass {
    Float,
    Int,
    Idx,
    Bytes,
}

/// One rule: how a key is read from, and written to, the 240-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RuleEntry {
    /// A big-endian int32 at `loc`.
    Long { loc: usize },
    /// A big-endian int16 at `loc`.
    Short { loc: usize },
    /// A big-endian int32 mantissa at `loc` paired with a shared int16
    /// scalar at `scalar_loc`. A negative scalar divides.
    SegyFloat { loc: usize, scalar_loc: usize },
    /// A virtual key with no on-disk presence.
    Index,
    /// An opaque passthrough of the full header.
    Copy,
}

impl RuleEntry {
    /// In-memory bytes one row of this rule occupies.
    pub fn memory_usage(&self) -> usize {
        match self {
            RuleEntry::Copy => TRACE_HEADER_LEN,
            _ => std::mem::size_of::<u64>(),
        }
    }

    /// The 0-based `[start, end)` header bytes this rule touches, if any.
    pub fn byte_extent(&self) -> Option<(usize, usize)> {
        match *self {
            RuleEntry::Long { loc } => Some((loc - 1, loc + 3)),
            RuleEntry::Short { loc } => Some((loc - 1, loc + 1)),
            RuleEntry::SegyFloat { loc, scalar_loc } => {
                let start = std::cmp::min(loc, scalar_loc) - 1;
                let end = std::cmp::max(loc + 3, scalar_loc + 1);
                Some((start, end))
            }
            RuleEntry::Index => None,
            RuleEntry::Copy => Some((0, TRACE_HEADER_LEN)),
        }
    }

    pub(crate) fn storage(&self) -> StorageClass {
        match self {
            RuleEntry::SegyFloat { .. } => StorageClass::Float,
            RuleEntry::Long { .. } | RuleEntry::Short { .. } => StorageClass::Int,
            RuleEntry::Index => StorageClass::Idx,
            RuleEntry::Copy => StorageClass::Bytes,
        }
    }
}

/// The default rule for a key: the SEG-Y rev1 byte position.
fn default_entry(key: TraceKey) -> RuleEntry {
    use TraceKey::*;
    match key {
        Copy => RuleEntry::Copy,
        Ltn | Gtn => RuleEntry::Index,
        LineTraceNum => RuleEntry::Long {
            loc: thb::LINE_TRACE_NUM,
        },
        FileTraceNum => RuleEntry::Long {
            loc: thb::FILE_TRACE_NUM,
        },
        FieldRecordNum => RuleEntry::Long {
            loc: thb::FIELD_RECORD_NUM,
        },
        EnsembleNum => RuleEntry::Long {
            loc: thb::ENSEMBLE_NUM,
        },
        Ns => RuleEntry::Short { loc: thb::NS },
        SampleInterval => RuleEntry::Short {
            loc: thb::SAMPLE_INTERVAL,
        },
        Offset => RuleEntry::Long { loc: thb::OFFSET },
        SourceX => RuleEntry::SegyFloat {
            loc: thb::SOURCE_X,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        SourceY => RuleEntry::SegyFloat {
            loc: thb::SOURCE_Y,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        ReceiverX => RuleEntry::SegyFloat {
            loc: thb::RECEIVER_X,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        ReceiverY => RuleEntry::SegyFloat {
            loc: thb::RECEIVER_Y,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        CdpX => RuleEntry::SegyFloat {
            loc: thb::CDP_X,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        CdpY => RuleEntry::SegyFloat {
            loc: thb::CDP_Y,
            scalar_loc: thb::COORDINATE_SCALAR,
        },
        Inline => RuleEntry::Long { loc: thb::INLINE },
        Crossline => RuleEntry::Long {
            loc: thb::CROSSLINE,
        },
        CoordinateScalar => RuleEntry::Short {
            loc: thb::COORDINATE_SCALAR,
        },
        Dsdr => RuleEntry::SegyFloat {
            loc: thb::SOURCE_MEASUREMENT,
            scalar_loc: thb::TIME_SCALAR,
        },
    }
}

/// The rules for one in-memory metadata table.
///
/// A map ensures there are no duplicates; iteration order is made stable by
/// sorting keys wherever row layout matters.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    entries: FnvHashMap<TraceKey, RuleEntry>,
    full_extent: bool,
}

impl RuleSet {
    /// Build a rule set for the given keys at their default locations.
    pub fn new(keys: &[TraceKey]) -> Self {
        let entries = keys.iter().map(|&k| (k, default_entry(k))).collect();
        RuleSet {
            entries,
            full_extent: false,
        }
    }

    /// The standard key set: trace numbering, sampling and geometry.
    pub fn with_defaults() -> Self {
        use TraceKey::*;
        Self::new(&[
            LineTraceNum,
            FileTraceNum,
            FieldRecordNum,
            EnsembleNum,
            Ns,
            SampleInterval,
            Offset,
            SourceX,
            SourceY,
            ReceiverX,
            ReceiverY,
            CdpX,
            CdpY,
            Inline,
            Crossline,
        ])
    }

    /// Add a key with its default rule. Returns false if already present.
    pub fn add_rule(&mut self, key: TraceKey) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, default_entry(key));
        true
    }

    pub fn add_long(&mut self, key: TraceKey, loc: usize) {
        self.entries.insert(key, RuleEntry::Long { loc });
    }

    pub fn add_short(&mut self, key: TraceKey, loc: usize) {
        self.entries.insert(key, RuleEntry::Short { loc });
    }

    pub fn add_segy_float(&mut self, key: TraceKey, loc: usize, scalar_loc: usize) {
        self.entries
            .insert(key, RuleEntry::SegyFloat { loc, scalar_loc });
    }

    pub fn add_index(&mut self, key: TraceKey) {
        self.entries.insert(key, RuleEntry::Index);
    }

    pub fn add_copy(&mut self) {
        self.entries.insert(TraceKey::Copy, RuleEntry::Copy);
    }

    pub fn rm_rule(&mut self, key: TraceKey) {
        self.entries.remove(&key);
    }

    pub fn get_entry(&self, key: TraceKey) -> Option<&RuleEntry> {
        self.entries.get(&key)
    }

    pub fn has_copy(&self) -> bool {
        self.entries.contains_key(&TraceKey::Copy)
    }

    /// Process the whole 240-byte header regardless of the rules' extents.
    pub fn set_full_extent(&mut self, full: bool) {
        self.full_extent = full;
    }

    /// The tight 0-based `[start, end)` envelope of all active rules.
    ///
    /// With a copy rule (or full extent requested) this is the whole header.
    pub fn extent(&self) -> (usize, usize) {
        if self.full_extent || self.has_copy() {
            return (0, TRACE_HEADER_LEN);
        }
        let mut start = TRACE_HEADER_LEN;
        let mut end = 0;
        for entry in self.entries.values() {
            if let Some((s, e)) = entry.byte_extent() {
                start = std::cmp::min(start, s);
                end = std::cmp::max(end, e);
            }
        }
        if end <= start {
            (0, 0)
        } else {
            (start, end)
        }
    }

    /// The byte length of the extent.
    pub fn extent_len(&self) -> usize {
        let (start, end) = self.extent();
        end - start
    }

    /// How much memory one row of a table with these rules requires.
    pub fn memory_usage_per_header(&self) -> usize {
        self.entries.values().map(|e| e.memory_usage()).sum()
    }

    /// The enabled keys in a stable order.
    pub fn keys_in_order(&self) -> Vec<TraceKey> {
        let mut keys: Vec<TraceKey> = self.entries.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn num_rules(&self) -> usize {
        self.entries.len()
    }
}
