//! Line transport: a background reader feeding decoded lines to a single
//! consumer over a bounded channel.

use std::io;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::session::Session;
use crate::stream::{DecodedLine, decode_line};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamMsg {
    Line(Box<DecodedLine>),
    /// Input reached end of file.
    Done,
    /// Reading failed. Sent at most once, and nothing follows it.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub channel_capacity: usize,
    /// Lines longer than this are skipped.
    pub max_line_bytes: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            max_line_bytes: 1024 * 1024,
        }
    }
}

/// Spawns a task that reads `reader` line by line and sends every decodable
/// line in order. The task stops early when the receiver is dropped.
pub fn spawn_line_reader<R>(
    reader: R,
    options: ReaderOptions,
) -> (mpsc::Receiver<StreamMsg>, JoinHandle<()>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
    let handle = tokio::spawn(read_lines(reader, options.max_line_bytes, tx));
    (rx, handle)
}

enum Frame {
    Line,
    /// A line over the limit was discarded; carries its length in bytes.
    Oversize(usize),
    Eof,
}

/// Reads the next line into `buf` without buffering more than
/// `max_line_bytes + 1` bytes of it. Longer lines are drained from the
/// reader and reported as [`Frame::Oversize`].
async fn next_frame<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_line_bytes: usize,
) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = max_line_bytes.saturating_add(1) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buf.len() <= max_line_bytes {
        return Ok(Frame::Line);
    }

    let mut skipped = buf.len();
    if buf.last() != Some(&b'\n') {
        skipped += discard_line(reader).await?;
    }
    buf.clear();
    Ok(Frame::Oversize(skipped))
}

async fn discard_line<R>(reader: &mut R) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut skipped = 0;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(skipped);
        }
        let (used, found) = match available.iter().position(|&b| b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        reader.consume(used);
        skipped += used;
        if found {
            return Ok(skipped);
        }
    }
}

/// Decodes one framed line. Invalid UTF-8 is replaced, not rejected.
fn decode_frame(buf: &[u8]) -> Option<DecodedLine> {
    let text = String::from_utf8_lossy(buf);
    decode_line(text.trim_end_matches(['\n', '\r']))
}

async fn read_lines<R>(mut reader: R, max_line_bytes: usize, tx: mpsc::Sender<StreamMsg>)
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut line_no = 0usize;
    loop {
        let frame = match next_frame(&mut reader, &mut buf, max_line_bytes).await {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "stream read failed");
                let _ = tx.send(StreamMsg::Failed(err.to_string())).await;
                return;
            }
        };
        line_no += 1;
        match frame {
            Frame::Eof => {
                let _ = tx.send(StreamMsg::Done).await;
                return;
            }
            Frame::Oversize(bytes) => {
                warn!(line_no, bytes, max_line_bytes, "skipping oversize line");
            }
            Frame::Line => {
                let Some(decoded) = decode_frame(&buf) else {
                    trace!(line_no, "skipping undecodable line");
                    continue;
                };
                if tx.send(StreamMsg::Line(Box::new(decoded))).await.is_err() {
                    debug!("receiver dropped, stopping reader");
                    return;
                }
            }
        }
    }
}

/// Reads a whole capture with the same line policy as [`spawn_line_reader`]:
/// oversize lines are skipped and invalid UTF-8 is replaced.
pub async fn read_capture<R>(mut reader: R, max_line_bytes: usize) -> Result<Vec<DecodedLine>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut lines = Vec::new();
    let mut line_no = 0usize;
    loop {
        line_no += 1;
        match next_frame(&mut reader, &mut buf, max_line_bytes).await? {
            Frame::Eof => return Ok(lines),
            Frame::Oversize(bytes) => {
                warn!(line_no, bytes, max_line_bytes, "skipping oversize line");
            }
            Frame::Line => match decode_frame(&buf) {
                Some(decoded) => lines.push(decoded),
                None => trace!(line_no, "skipping undecodable line"),
            },
        }
    }
}

/// Feeds every message into `session` until the stream ends, then finalizes
/// the streaming turn. Returns the number of lines applied.
///
/// A read failure replaces the streaming turn with an error turn and is
/// returned as an error.
pub async fn drive(mut rx: mpsc::Receiver<StreamMsg>, session: &mut Session) -> Result<usize> {
    let mut applied = 0;
    while let Some(msg) = rx.recv().await {
        match msg {
            StreamMsg::Line(line) => {
                session.apply(&line);
                applied += 1;
            }
            StreamMsg::Done => break,
            StreamMsg::Failed(message) => {
                session.fail_response(message.clone());
                bail!("stream failed: {message}");
            }
        }
    }
    session.finish_response();
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::{AsyncRead, BufReader, ReadBuf};

    use super::*;
    use crate::transcript::{Block, Role};

    const INPUT: &str = concat!(
        r#"{"type":"system","subtype":"init","model":"claude-opus"}"#,
        "\n",
        "not json\n",
        "\n",
        r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}}"#,
        "\r\n",
        r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"lo"}}}"#,
        "\n",
        r#"{"type":"result","result":"Hello","session_id":"abc","total_cost_usd":0.01}"#,
    );

    #[tokio::test]
    async fn test_reader_sends_lines_then_done() {
        let (mut rx, handle) = spawn_line_reader(INPUT.as_bytes(), ReaderOptions::default());
        let mut kinds = Vec::new();
        let mut done = false;
        while let Some(msg) = rx.recv().await {
            match msg {
                StreamMsg::Line(line) => kinds.push(line.event.kind().as_str()),
                StreamMsg::Done => done = true,
                StreamMsg::Failed(message) => panic!("unexpected failure: {message}"),
            }
        }
        assert!(done);
        assert_eq!(kinds, vec!["system_init", "delta", "delta", "result"]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversize_lines_are_skipped() {
        let input = format!("{{\"type\":\"user\",\"pad\":\"{}\"}}\n{{\"type\":\"user\"}}\n", "x".repeat(64));
        let options = ReaderOptions {
            channel_capacity: 1,
            max_line_bytes: 32,
        };
        let (mut rx, _handle) = spawn_line_reader(io::Cursor::new(input.into_bytes()), options);
        let mut lines = 0;
        while let Some(msg) = rx.recv().await {
            if let StreamMsg::Line(_) = msg {
                lines += 1;
            }
        }
        assert_eq!(lines, 1);
    }

    #[tokio::test]
    async fn test_long_line_is_discarded_without_buffering() {
        let input = format!("{}\n{{\"type\":\"user\"}}\n", "x".repeat(64 * 1024));
        let mut reader = BufReader::with_capacity(512, io::Cursor::new(input.into_bytes()));
        let mut buf = Vec::new();

        let frame = next_frame(&mut reader, &mut buf, 32).await.unwrap();
        assert!(matches!(frame, Frame::Oversize(bytes) if bytes == 64 * 1024 + 1));
        assert!(buf.capacity() < 1024);

        let frame = next_frame(&mut reader, &mut buf, 32).await.unwrap();
        assert!(matches!(frame, Frame::Line));
        assert_eq!(buf, b"{\"type\":\"user\"}\n");
        assert!(matches!(
            next_frame(&mut reader, &mut buf, 32).await.unwrap(),
            Frame::Eof
        ));
    }

    #[tokio::test]
    async fn test_unterminated_oversize_line_at_eof() {
        let input = format!("{{\"type\":\"user\"}}\n{}", "y".repeat(100));
        let lines = read_capture(input.as_bytes(), 32).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].event.kind().as_str(), "user");
    }

    #[tokio::test]
    async fn test_capture_matches_live_reader() {
        let mut input = INPUT.as_bytes().to_vec();
        input.extend_from_slice(b"\n{\"type\":\"assistant\",\"message\":{\"content\":\"caf\xff\"}}\n");
        input.extend_from_slice(format!("{{\"type\":\"user\",\"pad\":\"{}\"}}\n", "z".repeat(400)).as_bytes());
        let options = ReaderOptions {
            channel_capacity: 4,
            max_line_bytes: 200,
        };

        let captured: Vec<String> = read_capture(input.as_slice(), options.max_line_bytes)
            .await
            .unwrap()
            .into_iter()
            .map(|line| line.event.raw)
            .collect();

        let (mut rx, _handle) = spawn_line_reader(io::Cursor::new(input), options);
        let mut streamed = Vec::new();
        while let Some(msg) = rx.recv().await {
            if let StreamMsg::Line(line) = msg {
                streamed.push(line.event.raw);
            }
        }

        assert_eq!(captured, streamed);
        assert_eq!(captured.len(), 5);
        assert!(captured[4].contains("caf\u{fffd}"));
    }

    #[tokio::test]
    async fn test_drive_finalizes_turn() {
        let (rx, _handle) = spawn_line_reader(INPUT.as_bytes(), ReaderOptions::default());
        let mut session = Session::default();
        session.begin_response();

        let applied = drive(rx, &mut session).await.unwrap();
        assert_eq!(applied, 4);

        let turn = session.last_assistant().map(|turn| (turn.is_streaming(), turn.blocks().to_vec()));
        assert_eq!(turn, Some((false, vec![Block::text("Hello")])));
        assert_eq!(session.session_id(), Some("abc"));
    }

    #[tokio::test]
    async fn test_drive_finalizes_when_channel_closes() {
        let (tx, rx) = mpsc::channel(4);
        let line = decode_line(
            r#"{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"cut"}}}"#,
        )
        .unwrap();
        tx.send(StreamMsg::Line(Box::new(line))).await.unwrap();
        drop(tx);

        let mut session = Session::default();
        session.begin_response();
        drive(rx, &mut session).await.unwrap();
        assert!(session.streaming_turn().is_none());
        assert_eq!(session.turns()[0].text(), "cut");
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed")))
        }
    }

    #[tokio::test]
    async fn test_read_failure_becomes_error_turn() {
        let (rx, _handle) =
            spawn_line_reader(BufReader::new(FailingReader), ReaderOptions::default());
        let mut session = Session::default();
        session.push_user("hi");
        session.begin_response();

        let err = drive(rx, &mut session).await.err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("stream failed: pipe closed"));
        assert_eq!(session.turns()[1].role(), Role::Error);
        assert_eq!(session.turns()[1].text(), "pipe closed");
    }
}
