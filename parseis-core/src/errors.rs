use crate::rules::TraceKey;

/// Basic Error types.
#[derive(Debug)]
pub enum ParseisError {
    /// TryFromSliceError from the std library.
    TryFromSlice(std::array::TryFromSliceError),
    /// IoError from the std library.
    StdIoError(std::io::Error),
    /// File is too short to hold a SEG-Y reel header.
    FileTooShort { size: u64 },
    /// An error caused by an invalid header.
    InvalidHeader { msg: String },
    /// The sample count does not fit the on-disk int16 field.
    NsOutOfRange { ns: usize },
    /// The sample interval is not a normal, positive number.
    BadSampleInterval { interval: f64 },
    /// The trace sample format is not one this library transcodes.
    UnsupportedFormat { code: u16 },
    /// Bit conversion cannot fulfil the conversion.
    BitConversion { msg: String },
    /// A metadata key has no rule in the active rule set.
    KeyNotFound { key: TraceKey },
    /// A metadata key was accessed through the wrong entry type.
    WrongEntryType { key: TraceKey },
    /// A row index is beyond the rows of the metadata table.
    RowOutOfBounds { row: usize, rows: usize },
    /// A trace index is beyond the traces of the file.
    TraceOutOfBounds { offset: usize, nt: usize },
    /// Enum creation error.
    ParseEnum { f: String, code: u16 },
    /// An output file was consumed without the collective close.
    UnclosedOutput { name: String },
    /// One or more ranks recorded a fatal entry in the group report.
    ReportedFailure { entries: Vec<String> },
}

impl From<std::array::TryFromSliceError> for ParseisError {
    fn from(e: std::array::TryFromSliceError) -> Self {
        Self::TryFromSlice(e)
    }
}

impl From<std::io::Error> for ParseisError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl std::fmt::Display for ParseisError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::ParseisError::*;
        match self {
            TryFromSlice(x) => write!(fmt, "{}", x),
            StdIoError(x) => write!(fmt, "{}", x),
            FileTooShort { size } => {
                write!(fmt, "File is {} bytes, too short to be SEG-Y", size)
            }
            InvalidHeader { msg } => write!(fmt, "Invalid header: {}", msg),
            NsOutOfRange { ns } => write!(fmt, "Ns value ({}) is too large for SEG-Y", ns),
            BadSampleInterval { interval } => {
                write!(fmt, "The SEG-Y interval {} is not normal", interval)
            }
            UnsupportedFormat { code } => {
                write!(fmt, "Sample format code {} is not IBM (1) or IEEE (5)", code)
            }
            BitConversion { msg } => write!(fmt, "Bit conversion failed: {}", msg),
            KeyNotFound { key } => write!(fmt, "No rule for key {:?} in the rule set", key),
            WrongEntryType { key } => {
                write!(fmt, "Key {:?} is not stored with the requested type", key)
            }
            RowOutOfBounds { row, rows } => {
                write!(fmt, "Row {} is out of bounds of a {}-row table", row, rows)
            }
            TraceOutOfBounds { offset, nt } => {
                write!(fmt, "Trace {} is out of bounds of a {}-trace file", offset, nt)
            }
            ParseEnum { f, code } => write!(fmt, "Could not parse source ({}) to {}.", code, f),
            UnclosedOutput { name } => {
                write!(fmt, "Output file {} consumed without close()", name)
            }
            ReportedFailure { entries } => {
                write!(fmt, "A rank recorded a fatal entry: {}", entries.join("; "))
            }
        }
    }
}

impl From<ParseisError> for String {
    fn from(e: ParseisError) -> String {
        e.to_string()
    }
}

impl std::error::Error for ParseisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::ParseisError::*;
        match self {
            StdIoError(x) => x.source(),
            TryFromSlice(x) => x.source(),
            _ => None,
        }
    }
}
