use std::fs::File;
use std::io::{self, Read};

use stdwire_channel::Mode;
use stdwire_envelope::decode_request;
use stdwire_frame::{Frame, FrameConfig, FrameError, FrameReader, PROCESS_ALIVE};

use crate::cmd::InspectArgs;
use crate::exit::{frame_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, InspectedFrame, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let source: Box<dyn Read> = match &args.file {
        Some(path) => Box::new(
            File::open(path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?,
        ),
        None => Box::new(io::stdin().lock()),
    };

    let config = args.wire.config(Mode::Bridge).frame;
    let frames = inspect(source, config)?;
    print_frames(&frames, format);

    if frames.iter().any(|frame| frame.request.is_err()) {
        Ok(DATA_INVALID)
    } else {
        Ok(SUCCESS)
    }
}

/// Split `source` into frames and decode each one as a request.
///
/// A leading handshake marker is skipped, so captured worker output can be
/// inspected as well.
fn inspect<R: Read>(source: R, config: FrameConfig) -> CliResult<Vec<InspectedFrame>> {
    let charset = config.charset;
    let mut reader =
        FrameReader::with_config(source, config).map_err(|err| frame_error("invalid framing", err))?;
    if reader
        .read_marker(PROCESS_ALIVE)
        .map_err(|err| frame_error("read failed", err))?
    {
        tracing::debug!("skipped worker handshake");
    }

    let mut frames = Vec::new();
    loop {
        let index = frames.len() + 1;
        match reader.read_frame() {
            Ok(Some(frame)) => frames.push(describe(index, &frame, charset)),
            Ok(None) => break,
            Err(FrameError::FrameTooLarge { size, max }) => frames.push(InspectedFrame {
                index,
                size,
                body: String::new(),
                request: Err(FrameError::FrameTooLarge { size, max }.to_string()),
            }),
            Err(err) => return Err(frame_error("read failed", err)),
        }
    }
    Ok(frames)
}

fn describe(index: usize, frame: &Frame, charset: stdwire_frame::Charset) -> InspectedFrame {
    match frame.text(charset) {
        Ok(text) => InspectedFrame {
            index,
            size: frame.len(),
            request: decode_request(&text).map_err(|err| err.to_string()),
            body: text.into_owned(),
        },
        Err(err) => InspectedFrame {
            index,
            size: frame.len(),
            body: String::from_utf8_lossy(&frame.body).into_owned(),
            request: Err(err.to_string()),
        },
    }
}
