use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn cli_session_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("inventory-mesh");

    let (mut replica_child, mut replica_stdout) = spawn_replica(&binary).await?;
    let addr = read_replica_addr(&mut replica_stdout).await?;

    // Drain further replica logs in the background so the pipe never fills.
    let replica_log_task = tokio::spawn(async move {
        drain_stdout(replica_stdout).await;
    });

    let mut alice = spawn_client(&binary, "alice", &addr).await?;

    // The default catalog seeds book1 with three copies.
    alice.send_line("CHECK book1").await?;
    assert_eq!(
        alice.read_line_expect("waiting for check response").await?,
        "alice, book1 is available, 3 left."
    );

    alice.send_line("BORROW book1").await?;
    assert_eq!(
        alice.read_line_expect("waiting for borrow response").await?,
        "alice, you have borrowed book1."
    );

    alice.send_line("CHECK book1").await?;
    assert_eq!(
        alice
            .read_line_expect("waiting for second check response")
            .await?,
        "alice, book1 is available, 2 left."
    );

    alice.send_line("RETURN bookX").await?;
    assert_eq!(
        alice.read_line_expect("waiting for return rejection").await?,
        "alice, invalid item bookX."
    );

    alice.send_line("HELP").await?;
    assert_eq!(
        alice
            .read_line_expect("waiting for invalid-option response")
            .await?,
        "alice, invalid option. Please try again."
    );

    alice.send_line("EXIT").await?;
    assert_eq!(
        alice.read_line_expect("waiting for local close notice").await?,
        "*** session closed"
    );

    ensure_success(&mut alice.child, "alice client").await?;

    // The replica stays up after the client leaves; terminate it manually.
    let _ = replica_child.kill().await;
    let _ = replica_child.wait().await;
    let _ = replica_log_task.await;

    Ok(())
}

struct ClientProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ClientProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to send line '{line}'"))?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line_expect(&mut self, description: &str) -> Result<String> {
        match read_line(&mut self.stdout).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(anyhow!("{description}: stream closed")),
            Err(err) => Err(err.context(format!("{description}: failed to read line"))),
        }
    }
}

async fn spawn_replica(binary: &Path) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("replica")
        .arg("--ordinal")
        .arg("0")
        .arg("--replicas")
        .arg("127.0.0.1:0")
        .arg("--election-timeout-ms")
        .arg("200")
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd.spawn().context("failed to spawn replica")?;
    let stdout = child
        .stdout
        .take()
        .context("replica stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

async fn read_replica_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    loop {
        let line = read_line(reader)
            .await?
            .context("replica did not emit a listening address")?;
        if !line.contains("listening on") {
            continue;
        }
        let addr = line
            .split_whitespace()
            .last()
            .context("unexpected replica banner format")?;
        if !addr.contains(':') {
            return Err(anyhow!("replica banner missing socket: {line}"));
        }
        return Ok(addr.to_string());
    }
}

async fn spawn_client(binary: &Path, username: &str, addr: &str) -> Result<ClientProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg("client")
        .arg("--username")
        .arg(username)
        .arg("--server")
        .arg(addr)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn client {username}"))?;

    let stdin = child
        .stdin
        .take()
        .context("client stdin missing after spawn")?;
    let stdout = child
        .stdout
        .take()
        .context("client stdout missing after spawn")?;

    let mut process = ClientProcess {
        child,
        stdin,
        stdout: BufReader::new(stdout),
    };

    let prompt = process.read_line_expect("waiting for username prompt").await?;
    if prompt != "Please enter your username:" {
        return Err(anyhow!("expected username prompt, got '{prompt}'"));
    }

    let welcome = process.read_line_expect("waiting for welcome line").await?;
    if welcome != format!("Welcome, {username}!") {
        return Err(anyhow!(
            "expected welcome line for {username}, got '{welcome}'"
        ));
    }

    Ok(process)
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let read_future = reader.read_line(&mut line);
    let byte_count = match timeout(READ_TIMEOUT, read_future).await {
        Ok(result) => result?,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    if byte_count == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}

async fn ensure_success(child: &mut Child, name: &str) -> Result<()> {
    let status = child
        .wait()
        .await
        .with_context(|| format!("failed to await {name} process"))?;
    if !status.success() {
        return Err(anyhow!("{name} exited with status {status}"));
    }
    Ok(())
}
