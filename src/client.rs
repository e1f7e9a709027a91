use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
};
use tracing::{info, warn};

use crate::{cli::ClientArgs, protocol};

pub async fn run(args: ClientArgs) -> Result<()> {
    let (mut reader, mut writer) = establish_connection(&args).await?;
    answer_username_prompt(&mut reader, &mut writer, &args.username).await?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    run_client_loop(&mut reader, &mut writer, &mut stdin, &mut input).await?;
    shutdown_connection(&mut writer).await;

    Ok(())
}

async fn establish_connection(
    args: &ClientArgs,
) -> Result<(
    BufReader<tokio::net::tcp::OwnedReadHalf>,
    tokio::net::tcp::OwnedWriteHalf,
)> {
    let stream = TcpStream::connect(args.server)
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;

    info!("connected to {}", args.server);

    let (reader, writer) = stream.into_split();
    Ok((BufReader::new(reader), writer))
}

/// Waits for the server's username prompt, echoes it, and answers with the
/// configured username. The welcome line arrives through the regular loop.
async fn answer_username_prompt(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    username: &str,
) -> Result<()> {
    let prompt = protocol::read_line(reader)
        .await?
        .context("server closed the connection before prompting")?;
    write_stdout(&prompt).await?;
    protocol::write_line(writer, username).await?;
    Ok(())
}

async fn run_client_loop(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    stdin: &mut BufReader<tokio::io::Stdin>,
    input: &mut String,
) -> Result<()> {
    loop {
        input.clear();
        select! {
            server_line = protocol::read_line(reader) => {
                match server_line? {
                    Some(line) => write_stdout(&line).await?,
                    None => {
                        write_stdout("*** server closed the connection").await?;
                        break;
                    }
                }
            }
            bytes_read = stdin.read_line(input) => {
                if !handle_stdin_input(bytes_read, input, writer).await? {
                    break;
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }
    Ok(())
}

async fn handle_stdin_input(
    bytes_read: io::Result<usize>,
    input: &str,
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
) -> Result<bool> {
    let bytes_read = bytes_read?;
    if bytes_read == 0 {
        return Ok(false);
    }

    let line = input.trim_end();
    if line.is_empty() {
        return Ok(true);
    }

    protocol::write_line(writer, line).await?;

    // EXIT gets no response from the server; acknowledge locally.
    if line == "EXIT" {
        write_stdout("*** session closed").await?;
        return Ok(false);
    }
    Ok(true)
}

async fn shutdown_connection(writer: &mut tokio::net::tcp::OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shut down client writer cleanly");
    }
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
