//! Line-delimited JSON request loop.
//!
//! Each request line is handled in its own task so a slow CODESYS run does
//! not hold up other calls. Responses are written as tasks complete, one JSON
//! object per line, and always carry the request id.

use std::sync::Arc;

use codesys_core::scripting::ProcessRunner;
use codesys_core::tools::ProjectTools;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;

use crate::dispatch::{self, Response};
use crate::error::{AppError, AppResult};

/// Serve requests from `input` until it closes and every request is answered.
pub async fn serve<R, I, O>(tools: Arc<ProjectTools<R>>, input: I, mut output: O) -> AppResult<()>
where
    R: ProcessRunner + 'static,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut tasks: JoinSet<Response> = JoinSet::new();
    let mut input_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let tools = Arc::clone(&tools);
                        tasks.spawn(async move { dispatch::handle_line(&tools, &line).await });
                    }
                    None => {
                        tracing::info!(pending = tasks.len(), "Input closed");
                        input_open = false;
                    }
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                match joined {
                    Ok(response) => write_response(&mut output, &response).await?,
                    Err(e) => tracing::error!(error = %e, "Request task failed"),
                }
            }
            else => break,
        }
    }

    output.flush().await?;
    Ok(())
}

async fn write_response<O: AsyncWrite + Unpin>(output: &mut O, response: &Response) -> AppResult<()> {
    let mut line = serde_json::to_string(response)
        .map_err(|e| AppError::InternalError(format!("Failed to encode response: {e}")))?;
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await?;
    tracing::debug!(id = %response.id(), "Response written");
    Ok(())
}
