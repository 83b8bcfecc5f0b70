//! Interactive read loop

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::session::AssistantSession;

/// Word that ends the loop (case-insensitive)
pub const EXIT_COMMAND: &str = "exit";

/// Returns true if the line asks to quit
#[must_use]
pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(EXIT_COMMAND)
}

/// Read utterances until `exit` or end of input, running one turn per line
///
/// A failed turn is logged and the loop keeps going. Returns the number of
/// turns attempted.
///
/// # Errors
///
/// Returns error only if reading input or writing the prompt fails
pub async fn run<R, W>(session: &AssistantSession, input: R, mut output: W) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all("=== Julia \u{2013} Offline Chat ===\nType 'exit' to quit.\n".as_bytes())
        .await?;

    let mut lines = input.lines();
    let mut turns = 0;

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        if is_exit(&line) {
            break;
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }

        turns += 1;
        match session.turn(utterance).await {
            Ok(report) => {
                if !report.reply.is_empty() {
                    output
                        .write_all(format!("Julia: {}\n", report.reply).as_bytes())
                        .await?;
                }
            }
            Err(e) => tracing::error!("turn failed: {e}"),
        }
    }

    output.flush().await?;
    Ok(turns)
}
