use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};

use crate::codec::{Frame, FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete bodies.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
    config: FrameConfig,
    eof: bool,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::build(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(inner, config))
    }

    fn build(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            decoder: FrameDecoder::new(&config),
            config,
            eof: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` once the source is exhausted. Bytes of a body that
    /// never saw its delimiter are discarded at that point.
    ///
    /// An oversized frame yields [`FrameError::FrameTooLarge`] once; the
    /// following call continues with the next frame.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buf)? {
                tracing::trace!(size = frame.len(), "frame split");
                return Ok(Some(frame));
            }

            if self.eof || !self.fill()? {
                let discarded = self.decoder.pending_len(&self.buf);
                if discarded > 0 {
                    tracing::debug!(discarded, "source closed with an unterminated frame");
                }
                self.buf.clear();
                return Ok(None);
            }
        }
    }

    /// Return the next frame only if it is already complete in the buffer.
    ///
    /// Never touches the source, so it cannot block.
    pub fn read_buffered_frame(&mut self) -> Result<Option<Frame>> {
        self.decoder.decode(&mut self.buf)
    }

    /// Iterate over the remaining frames.
    pub fn frames(&mut self) -> Frames<'_, T> {
        Frames { reader: self }
    }

    /// Consume an unframed marker (such as the worker handshake) from the
    /// front of the stream.
    ///
    /// Returns `Ok(false)` and leaves the buffered bytes untouched when the
    /// stream starts with something else or closes first.
    pub fn read_marker(&mut self, marker: &str) -> Result<bool> {
        let marker = self.config.charset.encode(marker).into_owned();
        while self.buf.len() < marker.len() {
            if !self.buf.is_empty() && !marker.starts_with(&self.buf) {
                return Ok(false);
            }
            if self.eof || !self.fill()? {
                return Ok(false);
            }
        }

        if self.buf.starts_with(&marker) {
            self.buf.advance(marker.len());
            return Ok(true);
        }
        Ok(false)
    }

    /// Pull one chunk from the source. Returns `false` at end-of-stream.
    fn fill(&mut self) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                self.eof = true;
                return Ok(false);
            }

            self.buf.extend_from_slice(&chunk[..read]);
            return Ok(true);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Iterator over the frames of a [`FrameReader`].
///
/// Ends at end-of-stream; an error is yielded once and ends iteration.
pub struct Frames<'a, T> {
    reader: &'a mut FrameReader<T>,
}

impl<T: Read> Iterator for Frames<'_, T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(err @ FrameError::FrameTooLarge { .. }) => Some(Err(err)),
            Err(err) => {
                self.reader.eof = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::charset::Charset;
    use crate::codec::PROCESS_ALIVE;

    fn body(frame: &Frame) -> &str {
        std::str::from_utf8(frame.body.as_ref()).unwrap()
    }

    #[test]
    fn read_two_frames_then_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(b"A\n#msg-end\nB\n#msg-end\n".to_vec()));

        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "A");
        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "B");
        assert!(reader.read_frame().unwrap().is_none());
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn trailing_body_without_delimiter_is_dropped() {
        let mut reader = FrameReader::new(Cursor::new(b"A\n#msg-end\nunfinished".to_vec()));

        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "A");
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn empty_source_is_end_of_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn empty_frame_is_yielded() {
        let mut reader = FrameReader::new(Cursor::new(b"\n#msg-end\n".to_vec()));
        let frame = reader.read_frame().unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"{\"id\":\"slow\"}\n#msg-end\n".to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(body(&frame), "{\"id\":\"slow\"}");
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn frames_iterator_collects_all_bodies() {
        let mut reader =
            FrameReader::new(Cursor::new(b"one\n#msg-end\ntwo\n#msg-end\n".to_vec()));

        let bodies: Vec<String> = reader
            .frames()
            .map(|frame| body(&frame.unwrap()).to_string())
            .collect();
        assert_eq!(bodies, vec!["one", "two"]);
    }

    #[test]
    fn latin1_bodies_decode_after_split() {
        let config = FrameConfig {
            charset: Charset::Latin1,
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config(Cursor::new(b"caf\xE9\n#msg-end\n".to_vec()), config).unwrap();

        let frame = reader.read_frame().unwrap().unwrap();
        assert_eq!(frame.text(reader.config().charset).unwrap(), "café");
    }

    #[test]
    fn with_config_rejects_invalid_delimiter() {
        let config = FrameConfig {
            delimiter: String::new(),
            ..FrameConfig::default()
        };
        let result = FrameReader::with_config(Cursor::new(Vec::<u8>::new()), config);
        assert!(matches!(result, Err(FrameError::InvalidDelimiter(_))));
    }

    #[test]
    fn oversized_frame_is_skipped_in_stream() {
        let config = FrameConfig {
            max_frame_size: 16,
            ..FrameConfig::default()
        };
        let mut wire = vec![b'x'; 1024];
        wire.extend_from_slice(b"\n#msg-end\nsmall\n#msg-end\n");
        let source = ChunkedReader {
            data: wire,
            pos: 0,
            chunk: 100,
        };
        let mut reader = FrameReader::with_config(source, config).unwrap();

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 1024, max: 16 }));
        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "small");
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn frames_iterator_continues_after_oversized_frame() {
        let config = FrameConfig {
            max_frame_size: 4,
            ..FrameConfig::default()
        };
        let wire = b"a\n#msg-end\ntoo long\n#msg-end\nb\n#msg-end\n".to_vec();
        let mut reader = FrameReader::with_config(Cursor::new(wire), config).unwrap();

        let results: Vec<Result<Frame>> = reader.frames().collect();
        assert_eq!(results.len(), 3);
        assert_eq!(body(results[0].as_ref().unwrap()), "a");
        assert!(matches!(results[1], Err(FrameError::FrameTooLarge { size: 8, .. })));
        assert_eq!(body(results[2].as_ref().unwrap()), "b");
    }

    #[test]
    fn unterminated_oversized_tail_ends_stream() {
        let config = FrameConfig {
            max_frame_size: 16,
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config(Cursor::new(vec![b'x'; 1024]), config).unwrap();
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn read_marker_consumes_handshake() {
        let wire = format!("{PROCESS_ALIVE}{{\"id\":\"1\"}}\n#msg-end\n");
        let mut reader = FrameReader::new(Cursor::new(wire.into_bytes()));

        assert!(reader.read_marker(PROCESS_ALIVE).unwrap());
        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "{\"id\":\"1\"}");
    }

    #[test]
    fn read_marker_leaves_other_data_alone() {
        let mut reader = FrameReader::new(Cursor::new(b"{\"id\":\"1\"}\n#msg-end\n".to_vec()));

        assert!(!reader.read_marker(PROCESS_ALIVE).unwrap());
        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "{\"id\":\"1\"}");
    }

    #[test]
    fn read_marker_on_closed_source() {
        let mut reader = FrameReader::new(Cursor::new(b"#proc".to_vec()));
        assert!(!reader.read_marker(PROCESS_ALIVE).unwrap());
    }

    #[test]
    fn buffered_frames_do_not_touch_the_source() {
        let mut reader = FrameReader::new(Cursor::new(b"A\n#msg-end\nB\n#msg-end\nC".to_vec()));
        assert!(reader.read_buffered_frame().unwrap().is_none());

        assert_eq!(body(&reader.read_frame().unwrap().unwrap()), "A");
        assert_eq!(body(&reader.read_buffered_frame().unwrap().unwrap()), "B");
        assert!(reader.read_buffered_frame().unwrap().is_none());
        assert_eq!(reader.get_ref().position(), 23);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(b"ok\n#msg-end\n".to_vec()),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(body(&framed.read_frame().unwrap().unwrap()), "ok");
    }

    #[test]
    fn broken_source_propagates_io_error() {
        let mut framed = FrameReader::new(BrokenReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn frames_iterator_stops_after_error() {
        let mut framed = FrameReader::new(BrokenReader);
        let mut frames = framed.frames();
        assert!(matches!(frames.next(), Some(Err(FrameError::Io(_)))));
        assert!(frames.next().is_none());
    }

    #[test]
    fn blocks_until_writer_finishes_frame() {
        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = FrameReader::new(right);

        let reader_thread = std::thread::spawn(move || {
            let first = reader.read_frame().unwrap().unwrap();
            let second = reader.read_frame().unwrap();
            (first, second)
        });

        left.write_all(b"{\"id\":").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        left.write_all(b"\"late\"}\n#msg-end\n").unwrap();
        drop(left);

        let (first, second) = reader_thread.join().unwrap();
        assert_eq!(body(&first), "{\"id\":\"late\"}");
        assert!(second.is_none());
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct ChunkedReader {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl Read for ChunkedReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let end = (self.pos + self.chunk.min(buf.len())).min(self.data.len());
            let n = end - self.pos;
            buf[..n].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            Ok(n)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
