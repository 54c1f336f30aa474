//! Container header (ID3v2) detection for concatenated MP3 segments.

use bytes::Bytes;

const MAGIC: &[u8; 3] = b"ID3";
const FIXED_LEN: usize = 10;

/// Total length of a leading ID3v2 tag, if `bytes` starts with one.
///
/// The tag size is a 28-bit synchsafe integer in bytes 6..10 (seven bits per
/// byte) and excludes the fixed 10-byte header.
pub fn declared_header_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < FIXED_LEN || &bytes[..3] != MAGIC {
        return None;
    }
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7f));
    Some(FIXED_LEN + size)
}

/// Drop a leading ID3v2 tag. Input without one, or whose declared tag would
/// consume every byte, is returned unchanged.
pub fn strip_container_header(bytes: Bytes) -> Bytes {
    match declared_header_len(&bytes) {
        Some(len) if len < bytes.len() => bytes.slice(len..),
        _ => bytes,
    }
}
