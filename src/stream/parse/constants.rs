//! Byte-level constants shared by the frame parser.

/// Newline byte
pub(crate) const LF: u8 = b'\n';
/// Carriage return byte
pub(crate) const CR: u8 = b'\r';

// bom = %xFEFF ; U+FEFF BYTE ORDER MARK
/// UTF-8 encoding of the byte order mark.
pub(crate) const BOM: &[u8; 3] = b"\xEF\xBB\xBF";
