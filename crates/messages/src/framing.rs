//! Balanced-brace framing over a byte stream.
//!
//! Receivers append every read into an accumulator, then repeatedly carve
//! off the first top-level balanced `{…}` object. There is no length prefix;
//! this matches peers that simply concatenate JSON objects on the wire.
//!
//! The scanner is string- and escape-aware so braces inside JSON strings do
//! not unbalance the count.

use thiserror::Error;

/// Framing failures; any of these blacklists the sending peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    #[error("unexpected byte {byte:#04x} before object start")]
    Garbage { byte: u8 },
    #[error("frame exceeds {limit} bytes without closing")]
    Oversized { limit: usize },
}

/// Default ceiling on a single frame; a response carries at most one chunk.
const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

/// Accumulates stream bytes and yields complete top-level JSON objects.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: Vec<u8>,
    max_frame: usize,
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

impl FrameAccumulator {
    pub fn new(max_frame: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered (complete or not).
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Carve off the next complete top-level object, if one is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FramingError> {
        // Skip inter-frame whitespace.
        let start = match self
            .buf
            .iter()
            .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        {
            Some(i) => i,
            None => {
                self.buf.clear();
                return Ok(None);
            }
        };
        if self.buf[start] != b'{' {
            return Err(FramingError::Garbage {
                byte: self.buf[start],
            });
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, &b) in self.buf[start..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + i + 1;
                        let frame = self.buf[start..end].to_vec();
                        self.buf.drain(..end);
                        return Ok(Some(frame));
                    }
                }
                _ => {}
            }
        }

        if self.buf.len() - start > self.max_frame {
            return Err(FramingError::Oversized {
                limit: self.max_frame,
            });
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut acc = FrameAccumulator::default();
        acc.push(br#"{"a":1}"#);
        assert_eq!(acc.next_frame().unwrap().unwrap(), br#"{"a":1}"#.to_vec());
        assert_eq!(acc.next_frame().unwrap(), None);
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut acc = FrameAccumulator::default();
        acc.push(br#"{"a":{"b":"#);
        assert_eq!(acc.next_frame().unwrap(), None);
        acc.push(br#"[1,2]}}"#);
        assert_eq!(
            acc.next_frame().unwrap().unwrap(),
            br#"{"a":{"b":[1,2]}}"#.to_vec()
        );
    }

    #[test]
    fn test_two_frames_in_one_read() {
        let mut acc = FrameAccumulator::default();
        acc.push(br#"{"x":1}{"y":2}"#);
        assert_eq!(acc.next_frame().unwrap().unwrap(), br#"{"x":1}"#.to_vec());
        assert_eq!(acc.next_frame().unwrap().unwrap(), br#"{"y":2}"#.to_vec());
        assert_eq!(acc.next_frame().unwrap(), None);
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let mut acc = FrameAccumulator::default();
        acc.push(br#"{"s":"}{ \" {"}"#);
        assert_eq!(
            acc.next_frame().unwrap().unwrap(),
            br#"{"s":"}{ \" {"}"#.to_vec()
        );
    }

    #[test]
    fn test_whitespace_between_frames() {
        let mut acc = FrameAccumulator::default();
        acc.push(b"  \n{\"a\":1}\r\n {\"b\":2}");
        assert_eq!(acc.next_frame().unwrap().unwrap(), br#"{"a":1}"#.to_vec());
        assert_eq!(acc.next_frame().unwrap().unwrap(), br#"{"b":2}"#.to_vec());
    }

    #[test]
    fn test_garbage_rejected() {
        let mut acc = FrameAccumulator::default();
        acc.push(b"hello{");
        assert_eq!(
            acc.next_frame().unwrap_err(),
            FramingError::Garbage { byte: b'h' }
        );
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut acc = FrameAccumulator::new(8);
        acc.push(br#"{"aaaaaaaaaaaaaaaa":"#);
        assert_eq!(
            acc.next_frame().unwrap_err(),
            FramingError::Oversized { limit: 8 }
        );
    }
}
