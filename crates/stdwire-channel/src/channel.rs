use std::io::{self, Read, Write};

use stdwire_envelope::{
    decode_request, encode_response, REQUEST_PARSE_FAILURE, RESPONSE_SERIALIZE_FAILURE,
};
use stdwire_frame::{Frame, FrameError, FrameReader, FrameWriter, PROCESS_ALIVE};

use crate::config::{ChannelConfig, Mode};
use crate::dispatcher::{dispatch, Handler, NoHandler};
use crate::error::Result;
use crate::state::{ChannelState, SharedState, StopHandle};

/// Counters for one [`Channel::listen`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenSummary {
    /// Frames read and answered.
    pub frames: u64,
    /// Frames that were oversized, not valid text or not a valid request.
    pub parse_failures: u64,
    /// Responses that could not be encoded.
    ///
    /// Response content is always a `serde_json::Value` by the time it is
    /// encoded, so this stays at zero unless a future content type can fail
    /// to serialize.
    pub serialize_failures: u64,
    /// Responses that carried an error from the handler.
    pub handler_failures: u64,
}

/// Blocking read-decode-dispatch-encode-write loop over one stream pair.
///
/// Every frame read from `source` gets exactly one frame back on `target`,
/// in order. Malformed or oversized requests are answered with a fixed error
/// body; only I/O failures end [`listen`](Self::listen) with an error.
///
/// # Stopping
///
/// [`StopHandle::stop`] is observed between frames. Frames already complete
/// in the read buffer are still answered, then the loop returns without
/// reading the source again. A read that is already blocked is not
/// interrupted: close the source to guarantee the loop exits.
pub struct Channel<R, W> {
    reader: FrameReader<R>,
    writer: Option<FrameWriter<W>>,
    config: ChannelConfig,
    state: SharedState,
}

impl<R: Read, W: Write> Channel<R, W> {
    /// Create a bridge channel. Without a target, responses are computed and
    /// dropped.
    pub fn new(source: R, target: Option<W>) -> Self {
        Self::from_parts(
            FrameReader::new(source),
            target.map(FrameWriter::new),
            ChannelConfig::default(),
        )
    }

    /// Bridge channel with default configuration.
    pub fn bridge(source: R, target: W) -> Self {
        Self::new(source, Some(target))
    }

    /// Worker channel with default configuration.
    pub fn worker(source: R, target: W) -> Self {
        Self::from_parts(
            FrameReader::new(source),
            Some(FrameWriter::new(target)),
            ChannelConfig::worker(),
        )
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(source: R, target: Option<W>, config: ChannelConfig) -> Result<Self> {
        let reader = FrameReader::with_config(source, config.frame.clone())?;
        let writer = target
            .map(|target| FrameWriter::with_config(target, config.frame.clone()))
            .transpose()?;
        Ok(Self::from_parts(reader, writer, config))
    }

    fn from_parts(
        reader: FrameReader<R>,
        writer: Option<FrameWriter<W>>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            reader,
            writer,
            config,
            state: SharedState::new(),
        }
    }

    /// Answer frames with `handler` until the source closes or a stop is
    /// requested.
    ///
    /// Blocks the calling thread for the whole run and invokes the handler
    /// on it.
    pub fn listen<H: Handler>(&mut self, mut handler: H) -> Result<ListenSummary> {
        self.run(Some(&mut handler))
    }

    /// Run the loop with no handler: every response only echoes the id.
    pub fn listen_without_handler(&mut self) -> Result<ListenSummary> {
        self.run::<NoHandler>(None)
    }

    fn run<H: Handler + ?Sized>(&mut self, mut handler: Option<&mut H>) -> Result<ListenSummary> {
        self.state.store(ChannelState::Listening);
        let _exit = StopOnExit(self.state.clone());

        tracing::info!(
            mode = ?self.config.mode,
            delimiter = %self.config.frame.delimiter,
            charset = %self.config.frame.charset,
            "channel listening"
        );

        if self.config.mode == Mode::Worker {
            if let Some(writer) = self.writer.as_mut() {
                writer.write_marker(PROCESS_ALIVE)?;
            }
        }

        let mut summary = ListenSummary::default();
        loop {
            let next = if self.state.load() == ChannelState::Stopping {
                self.reader.read_buffered_frame()
            } else {
                self.reader.read_frame()
            };
            let body = match next {
                Ok(Some(frame)) => self.respond(&frame, handler.as_deref_mut(), &mut summary),
                Ok(None) => break,
                Err(FrameError::FrameTooLarge { size, max }) => {
                    summary.parse_failures += 1;
                    tracing::warn!(size, max, "request frame too large, skipped");
                    REQUEST_PARSE_FAILURE.to_string()
                }
                Err(err) => return Err(err.into()),
            };

            summary.frames += 1;
            self.send(&body)?;
        }

        tracing::info!(
            frames = summary.frames,
            parse_failures = summary.parse_failures,
            handler_failures = summary.handler_failures,
            stop_requested = self.state.load() == ChannelState::Stopping,
            "channel stopped"
        );
        Ok(summary)
    }

    fn respond<H: Handler + ?Sized>(
        &self,
        frame: &Frame,
        handler: Option<&mut H>,
        summary: &mut ListenSummary,
    ) -> String {
        let text = match frame.text(self.config.frame.charset) {
            Ok(text) => text,
            Err(err) => {
                summary.parse_failures += 1;
                tracing::warn!(error = %err, "request frame is not valid text");
                return REQUEST_PARSE_FAILURE.to_string();
            }
        };
        let request = match decode_request(&text) {
            Ok(request) => request,
            Err(err) => {
                summary.parse_failures += 1;
                tracing::warn!(error = %err, size = frame.len(), "malformed request");
                return REQUEST_PARSE_FAILURE.to_string();
            }
        };
        tracing::debug!(id = ?request.id(), "request received");

        let response = dispatch(&request, handler);
        if response.is_error() {
            summary.handler_failures += 1;
        }

        match encode_response(&response, self.config.content_key) {
            Ok(body) => body,
            Err(err) => {
                summary.serialize_failures += 1;
                tracing::warn!(id = ?request.id(), error = %err, "response not encodable");
                RESPONSE_SERIALIZE_FAILURE.to_string()
            }
        }
    }

    fn send(&mut self, body: &str) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.write_frame(body)?,
            None => tracing::debug!(size = body.len(), "no target, response dropped"),
        }
        Ok(())
    }

    /// Request a stop. Returns `false` (and does nothing) unless listening.
    pub fn stop_listening(&self) -> bool {
        self.stop_handle().stop()
    }

    /// Handle for stopping the loop from a handler or another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.state.clone())
    }

    pub fn state(&self) -> ChannelState {
        self.state.load()
    }

    pub fn is_listening(&self) -> bool {
        self.state() == ChannelState::Listening
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Consume the channel and return its streams.
    pub fn into_inner(self) -> (R, Option<W>) {
        (
            self.reader.into_inner(),
            self.writer.map(FrameWriter::into_inner),
        )
    }
}

impl<R: Read> Channel<R, io::Sink> {
    /// Channel that answers nothing; handlers still run for every frame.
    pub fn without_target(source: R) -> Self {
        Self::new(source, None)
    }
}

struct StopOnExit(SharedState);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.store(ChannelState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, ErrorKind};
    use std::net::Shutdown;
    use std::os::unix::net::UnixStream;

    use serde_json::json;
    use stdwire_envelope::{ContentKey, ErrorInfo, Request, Response};
    use stdwire_frame::Charset;

    use super::*;
    use crate::dispatcher::{handler_fn, HandlerResult};
    use crate::error::ChannelError;

    const PING: &[u8] = b"{\"id\":\"x1\",\"query\":{\"operation\":\"ping\"},\"content\":null}\n#msg-end\n";

    fn operation(req: &Request, res: &mut Response) -> HandlerResult {
        res.text(req.query_string("operation").unwrap_or_default());
        Ok(())
    }

    fn output(channel: Channel<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        let (_, target) = channel.into_inner();
        String::from_utf8(target.unwrap()).unwrap()
    }

    #[test]
    fn answers_reference_request() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), Vec::new());
        let summary = channel.listen(operation).unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(channel.state(), ChannelState::Stopped);
        assert_eq!(
            output(channel),
            "{\"id\":\"x1\",\"query\":{},\"content\":\"ping\",\"error\":null}\n#msg-end\n"
        );
    }

    #[test]
    fn worker_announces_itself_first() {
        let mut channel = Channel::worker(Cursor::new(PING.to_vec()), Vec::new());
        channel.listen(operation).unwrap();

        let out = output(channel);
        assert!(out.starts_with("#proc-alive{"), "{out:?}");
        assert_eq!(
            &out["#proc-alive".len()..],
            "{\"id\":\"x1\",\"query\":{},\"content\":\"ping\",\"error\":null}\n#msg-end\n"
        );
    }

    #[test]
    fn worker_without_requests_only_announces() {
        let mut channel = Channel::worker(Cursor::new(Vec::new()), Vec::new());
        let summary = channel.listen_without_handler().unwrap();

        assert_eq!(summary, ListenSummary::default());
        assert_eq!(output(channel), "#proc-alive");
    }

    #[test]
    fn responses_follow_request_order() {
        let input = b"{\"id\":\"1\"}\n#msg-end\n{\"id\":\"2\"}\n#msg-end\n{\"id\":3}\n#msg-end\n";
        let mut channel = Channel::bridge(Cursor::new(input.to_vec()), Vec::new());
        channel
            .listen(handler_fn(|req, res| {
                res.text(format!("seen {}", req.id().unwrap_or("-")));
                Ok(())
            }))
            .unwrap();

        let out = output(channel);
        let bodies: Vec<&str> = out.split("\n#msg-end\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].contains("\"seen 1\""));
        assert!(bodies[1].contains("\"seen 2\""));
        assert!(bodies[2].starts_with("{\"id\":\"3\""));
    }

    #[test]
    fn malformed_request_is_answered_and_loop_continues() {
        let mut input = b"this is not json\n#msg-end\n".to_vec();
        input.extend_from_slice(PING);
        let mut channel = Channel::bridge(Cursor::new(input), Vec::new());
        let summary = channel.listen(operation).unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.parse_failures, 1);
        let out = output(channel);
        assert!(out.starts_with(&format!("{REQUEST_PARSE_FAILURE}\n#msg-end\n")));
        assert!(out.ends_with("\"content\":\"ping\",\"error\":null}\n#msg-end\n"));
    }

    #[test]
    fn parse_failure_does_not_echo_input() {
        let input = b"{\"secret\": \"hunter2\"\n#msg-end\n".to_vec();
        let mut channel = Channel::bridge(Cursor::new(input), Vec::new());
        channel.listen(operation).unwrap();

        let out = output(channel);
        assert!(!out.contains("hunter2"));
        let error: Response = serde_json::from_str(out.trim_end_matches("\n#msg-end\n")).unwrap();
        assert!(error.is_error());
    }

    #[test]
    fn invalid_text_counts_as_parse_failure() {
        let input = b"{\"id\":\"\xff\xfe\"}\n#msg-end\n".to_vec();
        let mut channel = Channel::bridge(Cursor::new(input), Vec::new());
        let summary = channel.listen(operation).unwrap();

        assert_eq!(summary.parse_failures, 1);
        assert_eq!(output(channel), format!("{REQUEST_PARSE_FAILURE}\n#msg-end\n"));
    }

    #[test]
    fn handler_error_is_answered() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), Vec::new());
        let summary = channel
            .listen(handler_fn(|_req, res| {
                res.text("partial");
                Err(ErrorInfo::new("boom").with_kind("handler").into())
            }))
            .unwrap();

        assert_eq!(summary.handler_failures, 1);
        assert_eq!(
            output(channel),
            "{\"id\":\"x1\",\"query\":{},\"content\":\"partial\",\"error\":{\"message\":\"boom\",\"kind\":\"handler\"}}\n#msg-end\n"
        );
    }

    #[test]
    fn handler_panic_does_not_end_the_loop() {
        let mut input = PING.to_vec();
        input.extend_from_slice(PING);
        let mut calls = 0;
        let mut channel = Channel::bridge(Cursor::new(input), Vec::new());
        let summary = channel
            .listen(handler_fn(|req, res| {
                calls += 1;
                if calls == 1 {
                    panic!("first call fails");
                }
                operation(req, res)
            }))
            .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.handler_failures, 1);
        let out = output(channel);
        assert!(out.contains("\"kind\":\"panic\""));
        assert!(out.contains("\"content\":\"ping\""));
    }

    #[test]
    fn no_handler_returns_bare_responses() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), Vec::new());
        channel.listen_without_handler().unwrap();

        assert_eq!(
            output(channel),
            "{\"id\":\"x1\",\"query\":{},\"content\":null,\"error\":null}\n#msg-end\n"
        );
    }

    #[test]
    fn unterminated_tail_is_ignored() {
        let mut input = PING.to_vec();
        input.extend_from_slice(b"{\"id\":\"x2\"}");
        let mut channel = Channel::bridge(Cursor::new(input), Vec::new());
        let summary = channel.listen(operation).unwrap();

        assert_eq!(summary.frames, 1);
        assert!(!output(channel).contains("x2"));
    }

    #[test]
    fn without_target_still_runs_handler() {
        let mut seen = Vec::new();
        let mut channel = Channel::without_target(Cursor::new(PING.to_vec()));
        let summary = channel
            .listen(handler_fn(|req, _res| {
                seen.push(req.id().map(str::to_string));
                Ok(())
            }))
            .unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(seen, vec![Some("x1".to_string())]);
    }

    #[test]
    fn stop_from_handler_answers_buffered_frames_only() {
        let mut input = Vec::new();
        for _ in 0..3 {
            input.extend_from_slice(PING);
        }
        let source = OnceThenFail {
            data: Some(input),
        };

        let mut channel = Channel::bridge(source, Vec::new());
        let stop = channel.stop_handle();
        let summary = channel
            .listen(handler_fn(move |req, res| {
                stop.stop();
                operation(req, res)
            }))
            .unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(channel.state(), ChannelState::Stopped);
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), Vec::new());
        assert!(!channel.stop_listening());
        assert_eq!(channel.state(), ChannelState::Idle);
        assert!(!channel.is_listening());

        let summary = channel.listen(operation).unwrap();
        assert_eq!(summary.frames, 1);
    }

    #[test]
    fn stop_then_close_returns_cleanly() {
        let (client, server) = UnixStream::pair().unwrap();
        let server_out = server.try_clone().unwrap();

        let mut channel = Channel::bridge(server, server_out);
        let stop = channel.stop_handle();
        let worker = std::thread::spawn(move || channel.listen(operation));

        let mut requests = FrameWriter::new(client.try_clone().unwrap());
        let mut responses = FrameReader::new(client.try_clone().unwrap());
        requests
            .write_frame("{\"id\":\"x1\",\"query\":{\"operation\":\"ping\"}}")
            .unwrap();
        let reply = responses.read_frame().unwrap().unwrap();
        assert!(reply.text(Charset::Utf8).unwrap().contains("\"ping\""));

        assert!(stop.stop());
        client.shutdown(Shutdown::Write).unwrap();

        let summary = worker.join().unwrap().unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(stop.state(), ChannelState::Stopped);
    }

    #[test]
    fn broken_target_is_fatal() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), BrokenWriter);
        let err = channel.listen(operation).unwrap_err();

        assert!(matches!(
            err,
            ChannelError::Frame(FrameError::Io(ref e)) if e.kind() == ErrorKind::BrokenPipe
        ));
        assert_eq!(channel.state(), ChannelState::Stopped);
    }

    #[test]
    fn oversized_request_is_answered_and_loop_continues() {
        let mut config = ChannelConfig::bridge();
        config.frame.max_frame_size = 64;
        let mut input =
            format!("{{\"id\":\"big\",\"content\":\"{}\"}}\n#msg-end\n", "x".repeat(100))
                .into_bytes();
        input.extend_from_slice(b"{\"id\":\"next\"}\n#msg-end\n");
        let mut channel =
            Channel::with_config(Cursor::new(input), Some(Vec::new()), config).unwrap();

        let summary = channel.listen(operation).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(
            output(channel),
            format!(
                "{REQUEST_PARSE_FAILURE}\n#msg-end\n{{\"id\":\"next\",\"query\":{{}},\"content\":\"\",\"error\":null}}\n#msg-end\n"
            )
        );
    }

    #[test]
    fn custom_framing_and_data_key() {
        let config = ChannelConfig::bridge()
            .with_charset(Charset::Latin1)
            .with_delimiter("#end")
            .with_content_key(ContentKey::Data);
        let input = b"{\"id\":\"l1\",\"data\":\"caf\xe9\"}\n#end\n".to_vec();
        let mut channel = Channel::with_config(Cursor::new(input), Some(Vec::new()), config).unwrap();
        channel
            .listen(handler_fn(|req, res| {
                res.text(req.text().unwrap_or_default().to_uppercase());
                Ok(())
            }))
            .unwrap();

        let (_, target) = channel.into_inner();
        assert_eq!(
            target.unwrap(),
            b"{\"id\":\"l1\",\"query\":{},\"data\":\"CAF\xc9\",\"error\":null}\n#end\n".to_vec()
        );
    }

    #[test]
    fn with_config_rejects_bad_delimiter() {
        let config = ChannelConfig::bridge().with_delimiter("two\nlines");
        let result = Channel::with_config(Cursor::new(Vec::new()), Some(Vec::new()), config);
        assert!(matches!(
            result,
            Err(ChannelError::Frame(FrameError::InvalidDelimiter(_)))
        ));
    }

    #[test]
    fn structured_content_is_written_as_json() {
        let mut channel = Channel::bridge(Cursor::new(PING.to_vec()), Vec::new());
        channel
            .listen(handler_fn(|_req, res| {
                res.value(json!({"pong": true}));
                Ok(())
            }))
            .unwrap();

        assert!(output(channel).contains("\"content\":{\"pong\":true}"));
    }

    struct OnceThenFail {
        data: Option<Vec<u8>>,
    }

    impl Read for OnceThenFail {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.take() {
                Some(data) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => Err(io::Error::other("source read after stop")),
            }
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
