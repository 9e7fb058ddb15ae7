use std::cmp;
use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// One decoded unit from a client's byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A line without its `\n` / `\r\n` terminator.
    Line(String),
    /// A line longer than the limit. Its bytes are dropped up to the next newline.
    TooLong,
}

/// Newline-delimited text decoder with a per-line byte limit.
///
/// Unlike `LinesCodec`, an over-long line is reported as a frame rather than an
/// error, so the stream keeps going, and invalid UTF-8 is replaced rather than
/// treated as a fatal I/O error. The limit applies to the line content, so a
/// trailing `\r` does not count against it.
#[derive(Debug, Clone)]
pub struct ChatLineCodec {
    max_length: usize,
    /// Where to resume the newline search on the next call.
    next_index: usize,
    discarding: bool,
}

impl ChatLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    /// Frame a complete line (terminator already removed).
    fn frame(&self, bytes: &[u8]) -> Frame {
        let content = without_cr(bytes);
        if content.len() > self.max_length {
            Frame::TooLong
        } else {
            Frame::Line(String::from_utf8_lossy(content).into_owned())
        }
    }
}

fn without_cr(bytes: &[u8]) -> &[u8] {
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

impl Decoder for ChatLineCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        // Room for the content, an optional `\r` and the `\n`
        let window = self.max_length.saturating_add(2);
        loop {
            let read_to = cmp::min(window, buf.len());
            let newline = buf[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    buf.advance(self.next_index + offset + 1);
                    self.discarding = false;
                    self.next_index = 0;
                }
                (true, None) => {
                    buf.advance(read_to);
                    self.next_index = 0;
                    if buf.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset;
                    self.next_index = 0;
                    let line = buf.split_to(end + 1);
                    return Ok(Some(self.frame(&line[..end])));
                }
                (false, None) if buf.len() >= window => {
                    self.discarding = true;
                    self.next_index = 0;
                    return Ok(Some(Frame::TooLong));
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        // Unterminated trailing line
        if buf.is_empty() || &buf[..] == b"\r" {
            buf.clear();
            return Ok(None);
        }

        self.next_index = 0;
        let line = buf.split_to(buf.len());
        Ok(Some(self.frame(&line)))
    }
}
