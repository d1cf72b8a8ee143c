use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::session::SessionEvent;

/// One revision of an utterance from the transcription source.
///
/// An utterance arrives as zero or more non-final revisions followed by
/// exactly one final revision that closes it. The next event, final or
/// not, begins a new utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn fin(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Listen for newline-delimited transcript JSON on a unix socket.
///
/// Each line becomes one [`TranscriptEvent`] forwarded to the session
/// channel in arrival order. Malformed lines are logged and skipped so a
/// glitchy transcriber cannot stall the session.
pub async fn listen(socket: PathBuf, tx: mpsc::Sender<SessionEvent>) -> anyhow::Result<()> {
    if socket.exists() {
        tokio::fs::remove_file(&socket).await.ok();
    }
    let listener = UnixListener::bind(&socket)?;
    info!(?socket, "listening for transcripts");
    loop {
        let (stream, _) = listener.accept().await?;
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = tokio::io::BufReader::new(stream).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<TranscriptEvent>(line) {
                            Ok(event) => {
                                debug!(text = %event.text, is_final = event.is_final, "transcript");
                                if tx.send(SessionEvent::Transcript(event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "malformed transcript line"),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "transcript read error");
                        break;
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn forwards_events_in_order_and_skips_garbage() {
        let dir = tempdir().unwrap();
        let sock = dir.path().join("asr.sock");
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(listen(sock.clone(), tx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut client = UnixStream::connect(&sock).await.unwrap();
        client
            .write_all(
                b"{\"text\":\"who is\",\"is_final\":false}\nnot json\n{\"text\":\"who is this\",\"is_final\":true}\n",
            )
            .await
            .unwrap();
        drop(client);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        match (first, second) {
            (SessionEvent::Transcript(a), SessionEvent::Transcript(b)) => {
                assert_eq!(a, TranscriptEvent::partial("who is"));
                assert_eq!(b, TranscriptEvent::fin("who is this"));
            }
            other => panic!("unexpected events: {other:?}"),
        }
        handle.abort();
    }
}
