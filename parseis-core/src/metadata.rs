//! The columnar container for per-trace metadata.
//!
//! A [`TraceMetadata`] table holds `N` rows with one typed column per key
//! enabled in its [`RuleSet`]: `f64` for scaled floats, `i64` for integer
//! fields, `usize` for virtual index keys and raw bytes for a copy rule.
//! Once the rule set is fixed the per-row memory usage is constant, so a
//! table can be pre-sized from a memory budget without reallocation.
use fnv::FnvHashMap;

use crate::errors::*;
use crate::rules::{RuleSet, StorageClass, TraceKey};
use crate::TRACE_HEADER_LEN;

/// One row of a table, packed for transport between ranks.
///
/// Values appear in the stable key order of the owning rule set; a packed
/// row is only meaningful to a table with equivalent rules.
#[derive(Debug, Clone, Default)]
pub struct PackedRow {
    pub floats: Vec<f64>,
    pub ints: Vec<i64>,
    pub indexes: Vec<usize>,
    pub copy: Vec<u8>,
}

/// A pre-sized table of trace metadata.
#[derive(Debug, Clone)]
pub struct TraceMetadata {
    pub(crate) rules: RuleSet,
    num_rows: usize,
    pub(crate) floats: FnvHashMap<TraceKey, Vec<f64>>,
    pub(crate) ints: FnvHashMap<TraceKey, Vec<i64>>,
    pub(crate) indexes: FnvHashMap<TraceKey, Vec<usize>>,
    pub(crate) copy: Vec<u8>,
}

impl TraceMetadata {
    /// Allocate a table of `num_rows` rows for the given rules.
    pub fn new(rules: RuleSet, num_rows: usize) -> Self {
        let mut floats = FnvHashMap::default();
        let mut ints = FnvHashMap::default();
        let mut indexes = FnvHashMap::default();
        let mut copy = Vec::new();
        for key in rules.keys_in_order() {
            let entry = rules
                .get_entry(key)
                .copied()
                .unwrap_or(crate::rules::RuleEntry::Index);
            match entry.storage() {
                StorageClass::Float => {
                    floats.insert(key, vec![0.0; num_rows]);
                }
                StorageClass::Int => {
                    ints.insert(key, vec![0; num_rows]);
                }
                StorageClass::Idx => {
                    indexes.insert(key, vec![0; num_rows]);
                }
                StorageClass::Bytes => {
                    copy = vec![0; num_rows * TRACE_HEADER_LEN];
                }
            }
        }
        TraceMetadata {
            rules,
            num_rows,
            floats,
            ints,
            indexes,
            copy,
        }
    }

    /// The rules this table was allocated for.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The number of rows.
    pub fn size(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// An estimate of the total memory held by the columns.
    pub fn memory_usage(&self) -> usize {
        self.num_rows * self.rules.memory_usage_per_header()
    }

    fn check_row(&self, row: usize) -> Result<(), ParseisError> {
        if row >= self.num_rows {
            return Err(ParseisError::RowOutOfBounds {
                row,
                rows: self.num_rows,
            });
        }
        Ok(())
    }

    pub fn get_floating_point(&self, row: usize, key: TraceKey) -> Result<f64, ParseisError> {
        self.check_row(row)?;
        match self.floats.get(&key) {
            Some(col) => Ok(col[row]),
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    pub fn set_floating_point(
        &mut self,
        row: usize,
        key: TraceKey,
        value: f64,
    ) -> Result<(), ParseisError> {
        self.check_row(row)?;
        match self.floats.get_mut(&key) {
            Some(col) => {
                col[row] = value;
                Ok(())
            }
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    pub fn get_integer(&self, row: usize, key: TraceKey) -> Result<i64, ParseisError> {
        self.check_row(row)?;
        match self.ints.get(&key) {
            Some(col) => Ok(col[row]),
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    pub fn set_integer(
        &mut self,
        row: usize,
        key: TraceKey,
        value: i64,
    ) -> Result<(), ParseisError> {
        self.check_row(row)?;
        match self.ints.get_mut(&key) {
            Some(col) => {
                col[row] = value;
                Ok(())
            }
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    pub fn get_index(&self, row: usize, key: TraceKey) -> Result<usize, ParseisError> {
        self.check_row(row)?;
        match self.indexes.get(&key) {
            Some(col) => Ok(col[row]),
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    pub fn set_index(
        &mut self,
        row: usize,
        key: TraceKey,
        value: usize,
    ) -> Result<(), ParseisError> {
        self.check_row(row)?;
        match self.indexes.get_mut(&key) {
            Some(col) => {
                col[row] = value;
                Ok(())
            }
            None if self.rules.get_entry(key).is_some() => {
                Err(ParseisError::WrongEntryType { key })
            }
            None => Err(ParseisError::KeyNotFound { key }),
        }
    }

    /// The buffered header bytes of a row, when a copy rule is enabled.
    pub fn copy_header(&self, row: usize) -> Result<&[u8], ParseisError> {
        self.check_row(row)?;
        if !self.rules.has_copy() {
            return Err(ParseisError::KeyNotFound {
                key: TraceKey::Copy,
            });
        }
        Ok(&self.copy[row * TRACE_HEADER_LEN..(row + 1) * TRACE_HEADER_LEN])
    }

    /// Copy every column of `src_row` in `src` into `dst_row` of this table.
    ///
    /// Both tables must carry rules for all of this table's keys.
    pub fn copy_entries(
        &mut self,
        dst_row: usize,
        src: &TraceMetadata,
        src_row: usize,
    ) -> Result<(), ParseisError> {
        self.check_row(dst_row)?;
        src.check_row(src_row)?;
        for key in self.rules.keys_in_order() {
            if let Some(col) = self.floats.get_mut(&key) {
                col[dst_row] = src.get_floating_point(src_row, key)?;
            } else if let Some(col) = self.ints.get_mut(&key) {
                col[dst_row] = src.get_integer(src_row, key)?;
            } else if let Some(col) = self.indexes.get_mut(&key) {
                col[dst_row] = src.get_index(src_row, key)?;
            } else if key == TraceKey::Copy {
                let bytes = src.copy_header(src_row)?.to_vec();
                self.copy[dst_row * TRACE_HEADER_LEN..(dst_row + 1) * TRACE_HEADER_LEN]
                    .copy_from_slice(&bytes);
            }
        }
        Ok(())
    }

    /// Pack one row for transport.
    pub fn pack_row(&self, row: usize) -> Result<PackedRow, ParseisError> {
        self.check_row(row)?;
        let mut packed = PackedRow::default();
        for key in self.rules.keys_in_order() {
            if let Some(col) = self.floats.get(&key) {
                packed.floats.push(col[row]);
            } else if let Some(col) = self.ints.get(&key) {
                packed.ints.push(col[row]);
            } else if let Some(col) = self.indexes.get(&key) {
                packed.indexes.push(col[row]);
            } else if key == TraceKey::Copy {
                packed
                    .copy
                    .extend_from_slice(self.copy_header(row)?);
            }
        }
        Ok(packed)
    }

    /// Unpack a row packed by a table with equivalent rules.
    pub fn unpack_row(&mut self, row: usize, packed: &PackedRow) -> Result<(), ParseisError> {
        self.check_row(row)?;
        let mut nf = 0;
        let mut ni = 0;
        let mut nx = 0;
        for key in self.rules.keys_in_order() {
            if let Some(col) = self.floats.get_mut(&key) {
                col[row] = packed.floats[nf];
                nf += 1;
            } else if let Some(col) = self.ints.get_mut(&key) {
                col[row] = packed.ints[ni];
                ni += 1;
            } else if let Some(col) = self.indexes.get_mut(&key) {
                col[row] = packed.indexes[nx];
                nx += 1;
            } else if key == TraceKey::Copy {
                self.copy[row * TRACE_HEADER_LEN..(row + 1) * TRACE_HEADER_LEN]
                    .copy_from_slice(&packed.copy);
            }
        }
        Ok(())
    }
}
