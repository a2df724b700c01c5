// Terminal front end for the chat channel.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::info;

use crate::session::Session;
use crate::stream::StreamUpdate;

/// Reads one message per line and streams each reply to `output` as it
/// arrives. An empty line or end of input ends the session.
pub async fn run_terminal_chat<R: BufRead, W: Write>(session: &mut Session, mut input: R, mut output: W) -> Result<()> {
    info!(session = %session.id, "Starting terminal chat");
    writeln!(output, "{}", session.prompts().title)?;
    writeln!(output, "{}", session.prompts().chat_placeholder)?;

    let mut greeted = false;
    loop {
        write!(output, "> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            break;
        }

        {
            let mut pending = session.submit_chat(prompt).await;
            let mut printed = 0;
            while let Some(update) = pending.next_update().await {
                match update {
                    StreamUpdate::Partial(_) => {
                        let buffer = pending.buffer();
                        write!(output, "{}", &buffer[printed..])?;
                        output.flush()?;
                        printed = buffer.len();
                    }
                    StreamUpdate::Complete(_) => writeln!(output)?,
                    StreamUpdate::Failed { reply, .. } => {
                        if printed > 0 {
                            writeln!(output)?;
                        }
                        writeln!(output, "{}", reply)?;
                    }
                }
            }
        }

        if !greeted {
            if let Some(welcome) = session.profile().welcome() {
                writeln!(output, "[{}]", welcome)?;
                greeted = true;
            }
        }
    }

    info!(turns = session.messages().len(), "Terminal chat finished");
    Ok(())
}
