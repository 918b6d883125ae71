//! Line-oriented request loop.
//!
//! Every request line is handled on its own task, so a slow commit never
//! blocks reading the next request. Responses are written as they complete
//! and may therefore come back out of order; clients match them by `id`.

use crate::commands::CommandHandler;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Serve requests from `input` until EOF, writing one response line each.
///
/// Returns the number of requests answered.
///
/// # Errors
///
/// I/O errors on either stream.
pub async fn serve<R, W>(handler: CommandHandler, input: R, mut output: W) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let reader = async move {
        let mut lines = input.lines();
        let mut received = 0usize;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            received += 1;
            let handler = handler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = handler.handle_line(&line).await;
                match serde_json::to_string(&response) {
                    Ok(encoded) => {
                        // Receiver only goes away when the writer failed.
                        let _ = tx.send(encoded);
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to encode response"),
                }
            });
        }
        drop(tx);
        tracing::debug!(received, "Input closed");
        Ok::<usize, std::io::Error>(received)
    };

    let writer = async {
        let mut written = 0usize;
        while let Some(encoded) = rx.recv().await {
            output.write_all(encoded.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
            written += 1;
        }
        Ok::<usize, std::io::Error>(written)
    };

    let (received, written) = tokio::join!(reader, writer);
    received?;
    written
}
