//! ASCII/EBCDIC handling for the 3200-byte reel text header.
//!
//! SEG-Y text headers in the wild come in both encodings with nothing in the
//! file saying which; the reader decides by majority of printable code
//! points, the same way most seismic tooling does.
use encoding8::ascii;
use encoding8::ebcdic;

/// Is `c` a printable ASCII code point?
pub fn is_printable_ascii(c: u8) -> bool {
    (0x20..=0x7e).contains(&c)
}

/// Is `c` a printable EBCDIC code point?
pub fn is_printable_ebcdic(c: u8) -> bool {
    is_printable_ascii(ebcdic::to_ascii(c))
}

/// Convert a single ASCII code point to EBCDIC.
pub fn ascii_to_ebcdic(c: u8) -> u8 {
    ascii::to_ebcdic(c)
}

/// Convert a single EBCDIC code point to ASCII.
pub fn ebcdic_to_ascii(c: u8) -> u8 {
    ebcdic::to_ascii(c)
}

/// Decode reel header text of unknown encoding into an ASCII string.
///
/// Counts printable ASCII against printable EBCDIC code points and converts
/// with whichever table claims the majority.
/// ```
/// # use parseis_core::text_encoding::{ascii_to_ebcdic, decode_reel_text};
/// let text = b"This is a string for testing EBCDIC conversion etc.";
/// let coded: Vec<u8> = text.iter().map(|&c| ascii_to_ebcdic(c)).collect();
/// assert_eq!(decode_reel_text(&coded), String::from_utf8_lossy(text));
/// ```
pub fn decode_reel_text(raw: &[u8]) -> String {
    let n_ascii = raw.iter().filter(|&&c| is_printable_ascii(c)).count();
    let n_ebcdic = raw.iter().filter(|&&c| is_printable_ebcdic(c)).count();

    if n_ascii > n_ebcdic {
        String::from_utf8_lossy(raw).to_string()
    } else {
        let converted: Vec<u8> = raw.iter().map(|&c| ebcdic::to_ascii(c)).collect();
        String::from_utf8_lossy(&converted).to_string()
    }
}

/// Lay a caller-supplied string out as the 3200-byte reel text region.
///
/// The text is always written as ASCII, right-padded with spaces or
/// truncated to fit.
pub fn layout_reel_text(text: &str, out: &mut [u8]) {
    let raw = text.as_bytes();
    let n = std::cmp::min(raw.len(), out.len());
    out[..n].copy_from_slice(&raw[..n]);
    for slot in out[n..].iter_mut() {
        *slot = b' ';
    }
}
