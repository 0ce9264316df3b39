//! gzip payload decoding

use std::io::Read;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;

use crate::error::DispatcherError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Decode a gzip payload read from `reader`.
///
/// The reader is borrowed; the caller still owns and closes it. Concatenated
/// gzip members are decoded as one payload. Input that does not start with
/// the gzip magic, or whose stream is corrupt, is `MalformedPayload`.
pub fn decode_gzip<R: Read + ?Sized>(reader: &mut R) -> Result<Bytes, DispatcherError> {
    let mut compressed = Vec::new();
    reader.read_to_end(&mut compressed)?;
    decode_buffered(&compressed)
}

/// Decode a gzip payload already held in memory.
pub(crate) fn decode_buffered(compressed: &[u8]) -> Result<Bytes, DispatcherError> {
    if !compressed.starts_with(&GZIP_MAGIC) {
        return Err(DispatcherError::malformed("missing gzip header"));
    }

    let mut decoded = Vec::new();
    MultiGzDecoder::new(compressed)
        .read_to_end(&mut decoded)
        .map_err(|e| DispatcherError::malformed(format!("corrupt gzip stream: {e}")))?;

    Ok(Bytes::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_single_member() {
        let compressed = gzip(b"{\"event\":1}");
        let decoded = decode_gzip(&mut compressed.as_slice()).unwrap();
        assert_eq!(&decoded[..], b"{\"event\":1}");
    }

    #[test]
    fn test_decode_concatenated_members() {
        let mut compressed = gzip(b"first,");
        compressed.extend(gzip(b"second"));
        let decoded = decode_gzip(&mut compressed.as_slice()).unwrap();
        assert_eq!(&decoded[..], b"first,second");
    }

    #[test]
    fn test_decode_empty_body() {
        let compressed = gzip(b"");
        let decoded = decode_gzip(&mut compressed.as_slice()).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_plain_text_is_malformed() {
        let err = decode_gzip(&mut &b"not gzip at all"[..]).unwrap_err();
        assert!(matches!(err, DispatcherError::MalformedPayload { .. }));
    }

    #[test]
    fn test_empty_input_is_malformed() {
        let err = decode_gzip(&mut &b""[..]).unwrap_err();
        assert!(matches!(err, DispatcherError::MalformedPayload { .. }));
    }

    #[test]
    fn test_truncated_stream_is_malformed() {
        let compressed = gzip(b"some payload that will be cut short");
        let truncated = &compressed[..compressed.len() - 6];
        let err = decode_gzip(&mut &truncated[..]).unwrap_err();
        assert!(err.to_string().contains("corrupt gzip stream"), "got: {err}");
    }
}
