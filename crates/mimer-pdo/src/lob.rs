//! Chunked LOB transfer.
//!
//! Writes go through [`ChunkSource`], which cuts a seekable source into
//! chunks of at most `chunk_size` bytes. For character LOBs a chunk never
//! ends inside a UTF-8 sequence: the trailing partial sequence (at most three
//! bytes) is held back by seeking the source backwards, so the next chunk
//! starts on a character boundary.
//!
//! Reads go through [`LobReader`], a pull-based `std::io::Read` over a LOB
//! column that fetches one chunk at a time.

use crate::diagnostics::{ErrorSlot, StatementScope};
use crate::native::NativeClient;
use mimer_pdo_core::{Error, ReadSeek, Result};
use std::io::{self, Read, SeekFrom};

/// Longest UTF-8 encoding of one character.
const MAX_UTF8_WIDTH: usize = 4;

/// Encoded width announced by a UTF-8 lead byte; `None` for continuation or
/// invalid bytes.
fn utf8_width(byte: u8) -> Option<usize> {
    match byte {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Length of the longest prefix of `bytes` that does not end inside a
/// multi-byte sequence.
///
/// Only the last three bytes are inspected. Malformed input is left for the
/// UTF-8 validation that follows.
pub fn complete_prefix_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(MAX_UTF8_WIDTH - 1) {
        let byte = bytes[len - back];
        if is_continuation(byte) {
            continue;
        }
        return match utf8_width(byte) {
            Some(width) if width > back => len - back,
            _ => len,
        };
    }
    len
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_full(source: &mut dyn ReadSeek, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Bytes between the current position and the end; the position is kept.
pub fn remaining_bytes(source: &mut dyn ReadSeek) -> io::Result<u64> {
    let start = source.stream_position()?;
    let end = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(start))?;
    Ok(end.saturating_sub(start))
}

/// Characters between the current position and the end, counted by lead
/// bytes; the position is kept.
pub fn remaining_characters(source: &mut dyn ReadSeek, chunk_size: usize) -> io::Result<u64> {
    let start = source.stream_position()?;
    let mut buf = vec![0u8; chunk_size.max(MAX_UTF8_WIDTH)];
    let mut count = 0u64;
    loop {
        let n = read_full(source, &mut buf)?;
        if n == 0 {
            break;
        }
        count += buf[..n].iter().filter(|b| !is_continuation(**b)).count() as u64;
    }
    source.seek(SeekFrom::Start(start))?;
    Ok(count)
}

/// One chunk ready for the native setter.
#[derive(Debug, PartialEq, Eq)]
pub enum Chunk<'a> {
    Binary(&'a [u8]),
    Text(&'a str),
}

impl Chunk<'_> {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Binary(b) => b.len(),
            Chunk::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits a LOB source into bounded chunks.
pub struct ChunkSource<'a> {
    source: &'a mut dyn ReadSeek,
    buf: Vec<u8>,
    character: bool,
    /// Bytes consumed from the source so far
    offset: u64,
}

impl<'a> ChunkSource<'a> {
    pub fn new(source: &'a mut dyn ReadSeek, chunk_size: usize, character: bool) -> Self {
        Self {
            source,
            buf: vec![0u8; chunk_size],
            character,
            offset: 0,
        }
    }

    /// The next chunk, or `None` once the source is exhausted.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<'_>>> {
        let n = read_full(self.source, &mut self.buf)?;
        if n == 0 {
            return Ok(None);
        }
        if !self.character {
            self.offset += n as u64;
            return Ok(Some(Chunk::Binary(&self.buf[..n])));
        }

        // A short read means end of input: nothing follows to complete a
        // trailing sequence, so validation reports it.
        let keep = if n == self.buf.len() {
            complete_prefix_len(&self.buf[..n])
        } else {
            n
        };
        if keep == 0 {
            return Err(Error::encoding(
                self.offset,
                format!(
                    "LOB chunk size {} cannot hold one complete character",
                    self.buf.len()
                ),
            ));
        }
        let held = n - keep;
        if held > 0 {
            self.source.seek(SeekFrom::Current(-(held as i64)))?;
            tracing::trace!(held, offset = self.offset, "holding back partial character");
        }

        let text = std::str::from_utf8(&self.buf[..keep]).map_err(|e| {
            Error::encoding(
                self.offset + e.valid_up_to() as u64,
                "character LOB source is not valid UTF-8",
            )
        })?;
        self.offset += keep as u64;
        Ok(Some(Chunk::Text(text)))
    }
}

/// Pull-based reader over a LOB column.
///
/// Each underlying read fetches at most one chunk from the native client.
/// Native failures are recorded on the owning statement and surface as
/// `io::Error`s wrapping the driver [`Error`].
pub struct LobReader<'st, C: NativeClient> {
    scope: StatementScope<'st, C>,
    errors: &'st ErrorSlot,
    lob: C::Lob,
    character: bool,
    /// Size reported when the LOB was opened (bytes or characters)
    size: u64,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    done: bool,
}

impl<'st, C: NativeClient> LobReader<'st, C> {
    pub(crate) fn new(
        scope: StatementScope<'st, C>,
        errors: &'st ErrorSlot,
        lob: C::Lob,
        size: u64,
        character: bool,
        chunk_size: usize,
    ) -> Self {
        let capacity = if character {
            chunk_size.max(MAX_UTF8_WIDTH)
        } else {
            chunk_size.max(1)
        };
        Self {
            scope,
            errors,
            lob,
            character,
            size,
            buf: vec![0u8; capacity],
            pos: 0,
            filled: 0,
            done: size == 0,
        }
    }

    /// Size of the LOB: bytes for binary LOBs, characters for character LOBs.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_character(&self) -> bool {
        self.character
    }

    fn fill(&mut self) -> Result<()> {
        let client = self.scope.client;
        let result = if self.character {
            client.get_nclob_data(&mut self.lob, &mut self.buf)
        } else {
            client.get_blob_data(&mut self.lob, &mut self.buf)
        };
        match result {
            Ok(0) => {
                self.done = true;
                self.filled = 0;
            }
            Ok(n) => {
                self.filled = n.min(self.buf.len());
                tracing::trace!(bytes = self.filled, "LOB chunk read");
            }
            Err(code) => {
                let err = self.scope.fail(code);
                self.errors.record(err.descriptor());
                return Err(err);
            }
        }
        self.pos = 0;
        Ok(())
    }

    /// Read the remaining content into memory.
    pub fn read_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while !self.done {
            if self.pos == self.filled {
                self.fill()?;
                continue;
            }
            out.extend_from_slice(&self.buf[self.pos..self.filled]);
            self.pos = self.filled;
        }
        Ok(out)
    }

    /// Read the remaining content of a character LOB as text.
    pub fn read_all_string(self) -> Result<String> {
        let bytes = self.read_all()?;
        String::from_utf8(bytes).map_err(|e| {
            Error::encoding(
                e.utf8_error().valid_up_to() as u64,
                "character LOB content is not valid UTF-8",
            )
        })
    }
}

impl<C: NativeClient> Read for LobReader<'_, C> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        while self.pos == self.filled {
            if self.done {
                return Ok(0);
            }
            self.fill().map_err(io::Error::other)?;
        }
        let n = out.len().min(self.filled - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl<C: NativeClient> std::fmt::Debug for LobReader<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobReader")
            .field("character", &self.character)
            .field("size", &self.size)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn chunks(data: &[u8], size: usize, character: bool) -> Result<Vec<Vec<u8>>> {
        let mut source = Cursor::new(data.to_vec());
        let mut chunker = ChunkSource::new(&mut source, size, character);
        let mut out = Vec::new();
        while let Some(chunk) = chunker.next_chunk()? {
            out.push(match chunk {
                Chunk::Binary(b) => b.to_vec(),
                Chunk::Text(s) => s.as_bytes().to_vec(),
            });
        }
        Ok(out)
    }

    #[test]
    fn test_complete_prefix_len() {
        assert_eq!(complete_prefix_len(b"abc"), 3);
        assert_eq!(complete_prefix_len("aé".as_bytes()), 3);
        assert_eq!(complete_prefix_len(&"aé".as_bytes()[..2]), 1);
        let four = "😀".as_bytes();
        assert_eq!(complete_prefix_len(four), 4);
        assert_eq!(complete_prefix_len(&four[..3]), 0);
        assert_eq!(complete_prefix_len(&four[..1]), 0);
        assert_eq!(complete_prefix_len(b""), 0);
    }

    #[test]
    fn test_four_byte_characters_through_five_byte_chunks() {
        let text = "😀😁😂";
        let out = chunks(text.as_bytes(), 5, true).unwrap();
        assert_eq!(out.iter().map(Vec::len).collect::<Vec<_>>(), [4, 4, 4]);
        assert_eq!(out.concat(), text.as_bytes());
    }

    #[test]
    fn test_ascii_chunking() {
        let data = vec![b'x'; 20_000];
        let out = chunks(&data, 8192, true).unwrap();
        assert_eq!(out.iter().map(Vec::len).collect::<Vec<_>>(), [8192, 8192, 3616]);
    }

    #[test]
    fn test_binary_chunks_ignore_boundaries() {
        let data = "😀😁😂".as_bytes();
        let out = chunks(data, 5, false).unwrap();
        assert_eq!(out.iter().map(Vec::len).collect::<Vec<_>>(), [5, 5, 2]);
    }

    #[test]
    fn test_chunk_too_small_for_character() {
        let err = chunks("😀".as_bytes(), 3, true).unwrap_err();
        match err {
            Error::Encoding(e) => assert_eq!(e.offset, 0),
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_reported_with_offset() {
        let mut data = b"abcd".to_vec();
        data.push(0xFF);
        data.extend_from_slice(b"ef");
        let err = chunks(&data, 4, true).unwrap_err();
        match err {
            Error::Encoding(e) => assert_eq!(e.offset, 4),
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_final_character() {
        let data = &"ab😀".as_bytes()[..4];
        assert!(matches!(chunks(data, 16, true), Err(Error::Encoding(_))));
    }

    #[test]
    fn test_remaining_counts_keep_position() {
        let mut source = Cursor::new("héllo😀".as_bytes().to_vec());
        source.set_position(1);
        assert_eq!(remaining_bytes(&mut source).unwrap(), 9);
        assert_eq!(remaining_characters(&mut source, 2).unwrap(), 5);
        assert_eq!(source.position(), 1);
    }
}
