//! Line codec shared by the root index and the per-directory file indexes.
//!
//! Both persisted encodings are UTF-8 lines of the form `"<key> <name>\n"`,
//! sorted ascending by name. The encoder emits lines incrementally through
//! a streaming [`Read`] adapter so the store's `put` consumes the index as
//! it is composed; the first write error surfaces synchronously through
//! `put`'s result.

use std::io::{BufRead, BufReader, Read};

use thiserror::Error;

/// Why a persisted index failed to decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A line without a key/name separator.
    #[error("malformed index, refusing to load: invalid entry {0:?}")]
    Malformed(String),

    /// The underlying read failed.
    #[error("error reading index entry: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode `"<key> <name>"` lines into `(key, name)` pairs.
///
/// Blank lines are skipped; a line with no space separator is malformed and
/// the whole index is refused.
pub fn decode_pairs<R: Read>(reader: R) -> Result<Vec<(String, String)>, DecodeError> {
    let mut pairs = Vec::new();
    let mut lines = BufReader::new(reader);
    let mut line = String::new();
    loop {
        line.clear();
        if lines.read_line(&mut line)? == 0 {
            break;
        }
        let entry = line.strip_suffix('\n').unwrap_or(&line);
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(' ') {
            Some((key, name)) => pairs.push((key.to_string(), name.to_string())),
            None => return Err(DecodeError::Malformed(entry.to_string())),
        }
    }
    Ok(pairs)
}

/// Streaming encoder over pre-sorted `(key, name)` pairs.
pub struct LineReader {
    pairs: std::vec::IntoIter<(String, String)>,
    buf: Vec<u8>,
    pos: usize,
}

impl Read for LineReader {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if self.pos < self.buf.len() {
                let n = out.len().min(self.buf.len() - self.pos);
                out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            match self.pairs.next() {
                Some((key, name)) => {
                    self.buf = format!("{key} {name}\n").into_bytes();
                    self.pos = 0;
                }
                None => return Ok(0),
            }
        }
    }
}

/// Encoder for `pairs`, which the caller has already sorted by name.
pub fn encode_pairs(pairs: Vec<(String, String)>) -> LineReader {
    LineReader {
        pairs: pairs.into_iter(),
        buf: Vec::new(),
        pos: 0,
    }
}

/// Exact encoded size in bytes, for store size hints.
pub fn encoded_len(pairs: &[(String, String)]) -> u64 {
    pairs
        .iter()
        .map(|(key, name)| key.len() as u64 + name.len() as u64 + 2)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_to_string(pairs: Vec<(&str, &str)>) -> String {
        let pairs = pairs
            .into_iter()
            .map(|(k, n)| (k.to_string(), n.to_string()))
            .collect::<Vec<_>>();
        let expected_len = encoded_len(&pairs);
        let mut out = String::new();
        encode_pairs(pairs)
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out.len() as u64, expected_len);
        out
    }

    #[test]
    fn test_encode_bit_exact() {
        assert_eq!(
            encode_to_string(vec![("d41d8", ""), ("abc12", "a"), ("9f0e4", "a/b")]),
            "d41d8 \nabc12 a\n9f0e4 a/b\n"
        );
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_to_string(vec![]), "");
    }

    #[test]
    fn test_decode_roundtrip() {
        let input = "k1 a\nk2 a/b\nk3 name with spaces\n";
        let pairs = decode_pairs(input.as_bytes()).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("k1".to_string(), "a".to_string()),
                ("k2".to_string(), "a/b".to_string()),
                ("k3".to_string(), "name with spaces".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_root_line_keeps_empty_name() {
        let pairs = decode_pairs("d41d8 \n".as_bytes()).unwrap();
        assert_eq!(pairs, vec![("d41d8".to_string(), String::new())]);
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let pairs = decode_pairs("k1 a\n\nk2 b\n".as_bytes()).unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_decode_tolerates_missing_final_newline() {
        let pairs = decode_pairs("k1 a\nk2 b".as_bytes()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("k2".to_string(), "b".to_string()));
    }

    #[test]
    fn test_decode_refuses_malformed_entry() {
        let err = decode_pairs("justonetoken\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(ref e) if e == "justonetoken"));
    }

    #[test]
    fn test_streaming_read_small_buffer() {
        let pairs = vec![("key".to_string(), "name".to_string())];
        let mut reader = encode_pairs(pairs);
        let mut out = Vec::new();
        let mut chunk = [0u8; 3];
        loop {
            let n = reader.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }
        assert_eq!(out, b"key name\n");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any key without a space and any name without a newline
            /// survive the line codec unchanged.
            #[test]
            fn prop_roundtrip(
                pairs in proptest::collection::vec(
                    ("[a-f0-9]{4,32}", "[^\n]{0,16}"),
                    0..8,
                ),
            ) {
                let mut encoded = Vec::new();
                encode_pairs(pairs.clone())
                    .read_to_end(&mut encoded)
                    .unwrap();
                prop_assert_eq!(encoded.len() as u64, encoded_len(&pairs));
                let decoded = decode_pairs(encoded.as_slice()).unwrap();
                prop_assert_eq!(decoded, pairs);
            }
        }
    }
}
