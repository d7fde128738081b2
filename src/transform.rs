use crate::chunk::Chunk;
use crate::error::BoxError;
use bytes::BytesMut;

/// A mapping applied to each chunk in flight.
///
/// Emits zero or one output chunk per input chunk and must preserve input
/// order; dropping chunks is legal only for an explicitly filtering
/// mapping. A mapping that buffers a partial chunk emits the tail from
/// [`flush`](Transform::flush) when the upstream ends.
pub trait Transform: Send {
    /// Map one input chunk to zero or one output chunk.
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError>;

    /// Emit any buffered partial chunk at end of stream.
    fn flush(&mut self) -> Result<Option<Chunk>, BoxError> {
        Ok(None)
    }

    /// Human-readable name for logging
    fn name(&self) -> &str {
        "transform"
    }
}

/// Pass-through mapping.
#[derive(Debug)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        Ok(Some(chunk))
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// ASCII-uppercase mapping.
#[derive(Debug)]
pub struct Uppercase;

impl Transform for Uppercase {
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        let upper: Vec<u8> = chunk.as_bytes().iter().map(|b| b.to_ascii_uppercase()).collect();
        Ok(Some(Chunk::from(upper)))
    }

    fn name(&self) -> &str {
        "uppercase"
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Hex-encoding mapping. Output is lowercase ASCII hex, two output bytes
/// per input byte.
#[derive(Debug)]
pub struct HexEncode;

impl Transform for HexEncode {
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        let mut out = Vec::with_capacity(chunk.len() * 2);
        for &b in chunk.as_bytes() {
            out.push(HEX_DIGITS[(b >> 4) as usize]);
            out.push(HEX_DIGITS[(b & 0x0f) as usize]);
        }
        Ok(Some(Chunk::from(out)))
    }

    fn name(&self) -> &str {
        "hex"
    }
}

/// Filtering mapping that drops chunks failing a predicate.
pub struct FilterChunks<F>
where
    F: FnMut(&Chunk) -> bool + Send,
{
    name: String,
    predicate: F,
}

impl<F> FilterChunks<F>
where
    F: FnMut(&Chunk) -> bool + Send,
{
    /// Create a new filter mapping
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> Transform for FilterChunks<F>
where
    F: FnMut(&Chunk) -> bool + Send,
{
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        if (self.predicate)(&chunk) {
            Ok(Some(chunk))
        } else {
            Ok(None)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fallible closure mapping.
pub struct MapChunks<F>
where
    F: FnMut(Chunk) -> Result<Chunk, BoxError> + Send,
{
    name: String,
    mapper: F,
}

impl<F> MapChunks<F>
where
    F: FnMut(Chunk) -> Result<Chunk, BoxError> + Send,
{
    /// Create a new map mapping
    pub fn new(name: impl Into<String>, mapper: F) -> Self {
        Self {
            name: name.into(),
            mapper,
        }
    }
}

impl<F> Transform for MapChunks<F>
where
    F: FnMut(Chunk) -> Result<Chunk, BoxError> + Send,
{
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        (self.mapper)(chunk).map(Some)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Re-chunking mapping that coalesces input into fixed-size output chunks.
///
/// Buffers bytes until at least `target` are held, then emits exactly one
/// `target`-sized chunk per input; the remainder stays buffered until a
/// later input or the end-of-stream flush, which emits the partial tail.
#[derive(Debug)]
pub struct Rechunk {
    target: usize,
    buf: BytesMut,
}

impl Rechunk {
    /// Create a re-chunker emitting chunks of `target` bytes.
    pub fn new(target: usize) -> Self {
        Self {
            target: target.max(1),
            buf: BytesMut::new(),
        }
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Transform for Rechunk {
    fn apply(&mut self, chunk: Chunk) -> Result<Option<Chunk>, BoxError> {
        self.buf.extend_from_slice(chunk.as_bytes());
        if self.buf.len() >= self.target {
            let out = self.buf.split_to(self.target).freeze();
            Ok(Some(Chunk::new(out)))
        } else {
            Ok(None)
        }
    }

    fn flush(&mut self) -> Result<Option<Chunk>, BoxError> {
        if self.buf.is_empty() {
            Ok(None)
        } else {
            let tail = self.buf.split().freeze();
            Ok(Some(Chunk::new(tail)))
        }
    }

    fn name(&self) -> &str {
        "rechunk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let mut t = Identity;
        let out = t.apply(Chunk::from("abc")).unwrap().unwrap();
        assert_eq!(out.as_bytes(), b"abc");
    }

    #[test]
    fn test_uppercase() {
        let mut t = Uppercase;
        let out = t.apply(Chunk::from("aBc1")).unwrap().unwrap();
        assert_eq!(out.as_bytes(), b"ABC1");
    }

    #[test]
    fn test_hex_encode() {
        let mut t = HexEncode;
        let out = t.apply(Chunk::new(vec![0x00u8, 0xff, 0x1a])).unwrap().unwrap();
        assert_eq!(out.as_bytes(), b"00ff1a");
    }

    #[test]
    fn test_filter_drops() {
        let mut t = FilterChunks::new("nonempty", |c: &Chunk| !c.is_empty());
        assert!(t.apply(Chunk::from("x")).unwrap().is_some());
        assert!(t.apply(Chunk::new(Vec::new())).unwrap().is_none());
    }

    #[test]
    fn test_map_propagates_error() {
        let mut t = MapChunks::new("failing", |_| Err("boom".into()));
        assert!(t.apply(Chunk::from("x")).is_err());
    }

    #[test]
    fn test_rechunk_emits_fixed_sizes() {
        let mut t = Rechunk::new(4);
        assert!(t.apply(Chunk::from("ab")).unwrap().is_none());
        let out = t.apply(Chunk::from("cdef")).unwrap().unwrap();
        assert_eq!(out.as_bytes(), b"abcd");
        assert_eq!(t.buffered(), 2);
    }

    #[test]
    fn test_rechunk_flushes_tail() {
        let mut t = Rechunk::new(4);
        t.apply(Chunk::from("abcde")).unwrap();
        let tail = t.flush().unwrap().unwrap();
        assert_eq!(tail.as_bytes(), b"e");
        assert!(t.flush().unwrap().is_none());
    }
}
