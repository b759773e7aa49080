//! Line-oriented command console.
//!
//! Each input line is a facade command; its reply is written back as one
//! line. `quit` or `exit` ends the session, as does end of input.

use std::sync::Arc;

use mavgc_command_protocol::{LineCodec, Reply};
use mavgc_core::CommandClient;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::RunnerResult;

/// Run commands from `reader` until it ends. Returns how many ran.
pub async fn run_console<R, W>(
    client: Arc<CommandClient>,
    mut reader: R,
    mut writer: W,
) -> RunnerResult<usize>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut read_buf = [0u8; 512];
    let mut executed = 0;

    loop {
        let n = reader.read(&mut read_buf).await?;
        if n == 0 {
            return Ok(executed);
        }
        // Lines completed before an overlong one are still answered first.
        let overflow = codec.push(&read_buf[..n]).err();

        while let Some(line) = codec.decode_line() {
            let line = line.trim().to_string();
            if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                return Ok(executed);
            }
            debug!("Console: {}", line);
            let client = Arc::clone(&client);
            let reply = tokio::task::spawn_blocking(move || client.call(&line)).await?;
            executed += 1;
            writer.write_all(&LineCodec::encode_line(&reply.to_string())).await?;
            writer.flush().await?;
        }

        if let Some(e) = overflow {
            warn!("Console: {}", e);
            writer.write_all(&LineCodec::encode_line(&Reply::BadCommand.to_string())).await?;
            writer.flush().await?;
        }
    }
}
