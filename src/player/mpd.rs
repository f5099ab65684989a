use std::time::Duration;

use error_stack::{IntoReport, Report, ResultExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::player::{Player, PlayerError, PlayerResult};

pub const MPD_TIMEOUT: Duration = Duration::from_secs(10);

/// Quotes an argument for the MPD protocol. Control characters cannot be
/// escaped in a command line and are refused.
pub fn quote_argument(argument: &str) -> PlayerResult<String> {
    if argument.chars().any(char::is_control) {
        return Err(Report::new(PlayerError)
            .attach_printable(format!("Argument contains control characters: {:?}", argument)));
    }
    let escaped = argument.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(format!("\"{}\"", escaped))
}

/// Client for the MPD text protocol. The socket is closed when the client is
/// dropped, whether or not `disconnect` was called.
#[derive(Debug)]
pub struct MpdClient {
    address: String,
    timeout: Duration,
    connection: Option<BufReader<TcpStream>>,
    server_version: Option<String>,
}

impl MpdClient {
    pub fn new(address: String) -> Self {
        Self {
            address,
            timeout: MPD_TIMEOUT,
            connection: None,
            server_version: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    async fn open(&mut self) -> PlayerResult<()> {
        let stream = timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .into_report()
            .attach_printable(format!("Timed out connecting to MPD at {}", self.address))
            .change_context(PlayerError)?
            .into_report()
            .attach_printable(format!("Could not connect to MPD at {}", self.address))
            .change_context(PlayerError)?;
        let mut connection = BufReader::new(stream);
        let greeting = read_line(&mut connection, self.timeout).await?;
        let version = greeting.strip_prefix("OK MPD ").ok_or_else(|| {
            Report::new(PlayerError).attach_printable(format!(
                "{} does not look like MPD, greeting was: {}",
                self.address, greeting
            ))
        })?;
        self.server_version = Some(version.to_string());
        self.connection = Some(connection);
        Ok(())
    }

    /// Sends one command and collects the response lines up to the final `OK`.
    /// An `ACK` line turns into an error.
    pub async fn command(&mut self, command: &str) -> PlayerResult<Vec<String>> {
        let request_timeout = self.timeout;
        let connection = self.connection.as_mut().ok_or_else(|| {
            Report::new(PlayerError).attach_printable("Not connected to MPD")
        })?;
        let result = exchange(connection, command, request_timeout).await;
        if let Err(report) = &result {
            if !report.contains::<MpdAck>() {
                // the stream is in an unknown state after an IO failure
                self.connection = None;
            }
        }
        result
    }
}

/// `ACK [error@command_listNum] {current_command} message_text` reply.
#[derive(Debug)]
pub struct MpdAck(pub String);

impl std::fmt::Display for MpdAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MpdAck {}

async fn exchange(
    connection: &mut BufReader<TcpStream>,
    command: &str,
    request_timeout: Duration,
) -> PlayerResult<Vec<String>> {
    let request = format!("{}\n", command);
    timeout(request_timeout, connection.get_mut().write_all(request.as_bytes()))
        .await
        .into_report()
        .change_context(PlayerError)?
        .into_report()
        .attach_printable(format!("Failed to send command: {}", command))
        .change_context(PlayerError)?;

    let mut lines = vec![];
    loop {
        let line = read_line(connection, request_timeout).await?;
        if line == "OK" {
            return Ok(lines);
        }
        if line.starts_with("ACK ") {
            return Err(Report::new(MpdAck(line))
                .change_context(PlayerError)
                .attach_printable(format!("MPD rejected command: {}", command)));
        }
        lines.push(line);
    }
}

async fn read_line(
    connection: &mut BufReader<TcpStream>,
    request_timeout: Duration,
) -> PlayerResult<String> {
    let mut line = String::new();
    let read = timeout(request_timeout, connection.read_line(&mut line))
        .await
        .into_report()
        .attach_printable("Timed out waiting for MPD")
        .change_context(PlayerError)?
        .into_report()
        .change_context(PlayerError)?;
    if read == 0 {
        return Err(Report::new(PlayerError).attach_printable("MPD closed the connection"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[async_trait::async_trait]
impl Player for MpdClient {
    async fn connect(&mut self) -> PlayerResult<()> {
        self.connection = None;
        self.open().await?;
        log::info!(
            "Connected to MPD {} at {}",
            self.server_version().unwrap_or("?"),
            self.address
        );
        Ok(())
    }

    async fn ping(&mut self) -> PlayerResult<()> {
        self.command("ping").await.map(|_| ())
    }

    async fn rescan(&mut self) -> PlayerResult<()> {
        let response = self.command("update").await?;
        log::debug!("MPD update: {:?}", response);
        Ok(())
    }

    async fn clear_queue(&mut self) -> PlayerResult<()> {
        self.command("clear").await.map(|_| ())
    }

    async fn enqueue(&mut self, path: &str) -> PlayerResult<()> {
        let argument = quote_argument(path)?;
        self.command(&format!("add {}", argument))
            .await
            .map(|_| ())
    }

    async fn play_from(&mut self, position: usize) -> PlayerResult<()> {
        self.command(&format!("play {}", position))
            .await
            .map(|_| ())
    }

    async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            // MPD closes the socket on `close` without replying
            let _ = timeout(
                self.timeout,
                connection.get_mut().write_all(b"close\n"),
            )
            .await;
            let _ = connection.get_mut().shutdown().await;
        }
    }
}
