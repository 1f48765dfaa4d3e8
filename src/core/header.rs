// IT02 header: magic tag followed by a length-prefixed JSON metadata block

use crate::core::constants::{MAGIC, MAGIC_SIZE, METADATA_LEN_SIZE};
use crate::core::error::{Result, TraceError};
use crate::core::format::AcquisitionMetadata;
use std::io::{ErrorKind, Read};

/// Reads into `buf` until it is full or the source is exhausted.
/// Returns how many bytes were read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Parses the header and leaves `reader` positioned at the first record.
/// Returns the metadata and the number of header bytes consumed.
pub fn read_header<R: Read>(reader: &mut R) -> Result<(AcquisitionMetadata, u64)> {
    let mut magic = [0u8; MAGIC_SIZE];
    let got = read_full(reader, &mut magic)?;
    if got < MAGIC_SIZE || &magic != MAGIC {
        return Err(TraceError::InvalidFormat {
            expected: MAGIC.to_vec(),
            got: magic[..got].to_vec(),
        });
    }

    let mut len_buf = [0u8; METADATA_LEN_SIZE];
    let got = read_full(reader, &mut len_buf)?;
    if got < METADATA_LEN_SIZE {
        return Err(TraceError::TruncatedHeader {
            expected: MAGIC_SIZE + METADATA_LEN_SIZE,
            available: MAGIC_SIZE + got,
        });
    }
    let metadata_len = u32::from_le_bytes(len_buf) as usize;

    // Grows with the bytes actually present, not with the declared length.
    let mut payload = Vec::new();
    let got = reader
        .by_ref()
        .take(metadata_len as u64)
        .read_to_end(&mut payload)?;
    if got < metadata_len {
        return Err(TraceError::TruncatedHeader {
            expected: MAGIC_SIZE + METADATA_LEN_SIZE + metadata_len,
            available: MAGIC_SIZE + METADATA_LEN_SIZE + got,
        });
    }

    let metadata = parse_metadata(&payload)?;
    let consumed = (MAGIC_SIZE + METADATA_LEN_SIZE + metadata_len) as u64;
    Ok((metadata, consumed))
}

pub fn parse_metadata(payload: &[u8]) -> Result<AcquisitionMetadata> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| TraceError::MalformedMetadata(format!("not UTF-8: {}", e)))?;
    let metadata: AcquisitionMetadata = serde_json::from_str(text)
        .map_err(|e| TraceError::MalformedMetadata(e.to_string()))?;
    metadata.validate()?;
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(json: &str) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(json.as_bytes());
        out
    }

    #[test]
    fn test_reads_header_and_stops_at_records() {
        let json = r#"{"channels":[0,2],"bin_width_micros":1000,"acquisition_time_millis":3}"#;
        let mut bytes = header_bytes(json);
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let mut cursor = Cursor::new(bytes);

        let (meta, consumed) = read_header(&mut cursor).unwrap();
        assert_eq!(meta.channels, vec![0, 2]);
        assert_eq!(meta.acquisition_time_millis, Some(3));
        assert_eq!(consumed, 8 + json.len() as u64);
        assert_eq!(cursor.position(), consumed);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = header_bytes("{}");
        bytes[..4].copy_from_slice(b"PLTX");
        let err = read_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::InvalidFormat { ref got, .. } if got == b"PLTX"));
    }

    #[test]
    fn test_short_magic_is_invalid_format() {
        let err = read_header(&mut Cursor::new(b"IT".to_vec())).unwrap_err();
        assert!(matches!(err, TraceError::InvalidFormat { .. }));
    }

    #[test]
    fn test_truncated_length_and_payload() {
        let err = read_header(&mut Cursor::new(b"IT02\x10\x00".to_vec())).unwrap_err();
        assert!(matches!(
            err,
            TraceError::TruncatedHeader { expected: 8, available: 6 }
        ));

        let mut bytes = header_bytes(r#"{"channels":[0],"bin_width_micros":10}"#);
        bytes.truncate(bytes.len() - 3);
        let err = read_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::TruncatedHeader { .. }));
    }

    #[test]
    fn test_huge_declared_length_on_short_stream() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(b"{}");
        let err = read_header(&mut Cursor::new(bytes)).unwrap_err();
        match err {
            TraceError::TruncatedHeader {
                expected,
                available,
            } => {
                assert_eq!(expected, 8 + u32::MAX as usize);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_required_fields() {
        let err = read_header(&mut Cursor::new(header_bytes(r#"{"channels":[0]}"#)))
            .unwrap_err();
        assert!(matches!(err, TraceError::MalformedMetadata(_)));

        let err = read_header(&mut Cursor::new(header_bytes(r#"{"bin_width_micros":5}"#)))
            .unwrap_err();
        assert!(matches!(err, TraceError::MalformedMetadata(_)));

        let err = read_header(&mut Cursor::new(header_bytes("not json"))).unwrap_err();
        assert!(matches!(err, TraceError::MalformedMetadata(_)));
    }

    #[test]
    fn test_non_utf8_payload() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        let err = read_header(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, TraceError::MalformedMetadata(_)));
    }
}
