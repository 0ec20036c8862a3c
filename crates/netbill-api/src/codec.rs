// Router API framing
//
// Words are length-prefixed UTF-8 strings; a sentence is a run of words
// closed by a zero-length word. The length prefix is a big-endian integer
// whose leading bits select its width:
//
//   0xxxxxxx                                  < 0x80
//   10xxxxxx xxxxxxxx                         < 0x4000
//   110xxxxx xxxxxxxx xxxxxxxx                < 0x20_0000
//   1110xxxx xxxxxxxx xxxxxxxx xxxxxxxx       < 0x1000_0000
//   11110000 xxxxxxxx xxxxxxxx xxxxxxxx xxxxxxxx

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::sentence::Sentence;

/// Default upper bound for a single decoded word (1 MiB).
pub const DEFAULT_MAX_WORD_LEN: usize = 1 << 20;

/// Number of prefix bytes the encoder uses for a word of `len` bytes.
pub fn length_width(len: usize) -> usize {
    match len {
        0..0x80 => 1,
        0x80..0x4000 => 2,
        0x4000..0x20_0000 => 3,
        0x20_0000..0x1000_0000 => 4,
        _ => 5,
    }
}

/// Append the length prefix for a word of `len` bytes to `dst`.
pub fn encode_length(len: usize, dst: &mut BytesMut) -> Result<(), Error> {
    let n = u32::try_from(len)
        .map_err(|_| Error::Protocol(format!("word of {len} bytes exceeds the 32-bit length limit")))?;
    match length_width(len) {
        1 => dst.put_u8(n.to_be_bytes()[3]),
        2 => dst.put_slice(&(n | 0x8000).to_be_bytes()[2..]),
        3 => dst.put_slice(&(n | 0x00C0_0000).to_be_bytes()[1..]),
        4 => dst.put_u32(n | 0xE000_0000),
        _ => {
            dst.put_u8(0xF0);
            dst.put_u32(n);
        }
    }
    Ok(())
}

/// Decode a length prefix from the front of `src`.
///
/// Returns `(length, prefix_width)`, or `None` when `src` does not yet hold
/// the whole prefix.
pub fn decode_length(src: &[u8]) -> Result<Option<(usize, usize)>, Error> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };

    let (width, head) = match first {
        0x00..=0x7F => (1, first),
        0x80..=0xBF => (2, first & 0x3F),
        0xC0..=0xDF => (3, first & 0x1F),
        0xE0..=0xEF => (4, first & 0x0F),
        0xF0 => (5, 0),
        _ => {
            return Err(Error::Protocol(format!(
                "unsupported control byte 0x{first:02X} in length prefix"
            )));
        }
    };

    let Some(rest) = src.get(1..width) else {
        return Ok(None);
    };

    let value = rest
        .iter()
        .fold(u64::from(head), |acc, &b| (acc << 8) | u64::from(b));
    let len = usize::try_from(value)
        .map_err(|_| Error::Protocol(format!("length {value} does not fit in memory")))?;
    Ok(Some((len, width)))
}

/// Result of scanning a buffer for words.
struct Scan {
    words: Vec<String>,
    consumed: usize,
    terminated: bool,
}

/// Walk complete words from the front of `src`, stopping at the sentence
/// terminator or at the first incomplete word.
fn scan_words(src: &[u8], max_word_len: usize) -> Result<Scan, Error> {
    let mut words = Vec::new();
    let mut offset = 0;

    loop {
        let Some((len, width)) = decode_length(&src[offset..])? else {
            return Ok(Scan {
                words,
                consumed: offset,
                terminated: false,
            });
        };

        if len == 0 {
            return Ok(Scan {
                words,
                consumed: offset + width,
                terminated: true,
            });
        }

        if len > max_word_len {
            return Err(Error::Protocol(format!(
                "word of {len} bytes exceeds limit of {max_word_len}"
            )));
        }

        let start = offset + width;
        let end = start + len;
        let Some(raw) = src.get(start..end) else {
            return Ok(Scan {
                words,
                consumed: offset,
                terminated: false,
            });
        };

        let word = std::str::from_utf8(raw)
            .map_err(|e| Error::Protocol(format!("word is not valid UTF-8: {e}")))?;
        words.push(word.to_owned());
        offset = end;
    }
}

/// `tokio_util` codec turning a byte stream into [`Sentence`]s and back.
#[derive(Debug, Clone)]
pub struct SentenceCodec {
    max_word_len: usize,
}

impl SentenceCodec {
    pub fn new() -> Self {
        Self {
            max_word_len: DEFAULT_MAX_WORD_LEN,
        }
    }

    /// Override the largest word the decoder accepts.
    pub fn with_max_word_len(max_word_len: usize) -> Self {
        Self { max_word_len }
    }
}

impl Default for SentenceCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SentenceCodec {
    type Item = Sentence;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Sentence>, Error> {
        let scan = scan_words(src, self.max_word_len)?;
        if !scan.terminated {
            return Ok(None);
        }
        src.advance(scan.consumed);
        Ok(Some(Sentence::from_words(scan.words)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Sentence>, Error> {
        if let Some(sentence) = self.decode(src)? {
            return Ok(Some(sentence));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Some peers close the socket straight after `!done` without the
        // trailing terminator; accept that as a complete sentence.
        let scan = scan_words(src, self.max_word_len)?;
        if scan.consumed == src.len() && scan.words.last().is_some_and(|w| w == "!done") {
            src.advance(scan.consumed);
            return Ok(Some(Sentence::from_words(scan.words)));
        }

        Err(Error::Protocol(format!(
            "stream ended inside a sentence ({} bytes left)",
            src.len()
        )))
    }
}

impl Encoder<Sentence> for SentenceCodec {
    type Error = Error;

    fn encode(&mut self, sentence: Sentence, dst: &mut BytesMut) -> Result<(), Error> {
        for word in sentence.words() {
            encode_length(word.len(), dst)?;
            dst.put_slice(word.as_bytes());
        }
        dst.put_u8(0);
        Ok(())
    }
}
