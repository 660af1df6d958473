//! Operator Console
//!
//! Prompt and line I/O used by the interactive interception callback. The
//! trait keeps the callback testable against scripted input.

use async_trait::async_trait;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Line-oriented console the interactive callback talks to.
///
/// `None` from the reading operations means the input was interrupted or
/// closed (EOF); callers treat that as "keep the data as it was".
#[async_trait]
pub trait Console: Send + Sync {
    /// Write one line of output
    async fn write_line(&self, line: &str);

    /// Write a prompt without a trailing newline and read the answer
    async fn prompt(&self, text: &str) -> Option<String>;

    /// Read one line of input, without the trailing newline
    async fn read_line(&self) -> Option<String>;
}

/// Console backed by the process stdin/stdout
pub struct StdioConsole {
    stdin: Mutex<BufReader<Stdin>>,
}

impl StdioConsole {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(io::stdin())),
        }
    }
}

impl Default for StdioConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for StdioConsole {
    async fn write_line(&self, line: &str) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(line.as_bytes()).await;
        let _ = stdout.write_all(b"\n").await;
        let _ = stdout.flush().await;
    }

    async fn prompt(&self, text: &str) -> Option<String> {
        let mut stdout = io::stdout();
        stdout.write_all(text.as_bytes()).await.ok()?;
        stdout.flush().await.ok()?;
        self.read_line().await
    }

    async fn read_line(&self) -> Option<String> {
        let mut stdin = self.stdin.lock().await;
        let mut line = String::new();
        match stdin.read_line(&mut line).await {
            Ok(0) => None,
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Some(line)
            }
            Err(_) => None,
        }
    }
}
