//! Interactive Interception Callback
//!
//! Shows every relayed chunk to the operator and lets them rewrite it as
//! ASCII-hex before it is forwarded.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::error;

use super::callback::{Intercept, Payload};
use super::console::Console;
use super::{dump, hex};

const SEPARATOR_WIDTH: usize = 78;

/// Prompts the operator for every chunk; declining or interrupting keeps the
/// original data.
pub struct Interactive {
    console: Arc<dyn Console>,
}

impl Interactive {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Self { console }
    }

    async fn read_replacement(&self) -> Option<String> {
        self.console
            .write_line("Type bytes you want to replace data with as ascii-hex")
            .await;
        self.console.write_line("Ie: 41 42 43 44 for ABCD").await;
        self.console.write_line("End with empty line.").await;

        let mut entered = String::new();
        loop {
            let line = self.console.read_line().await?;
            if line.is_empty() {
                break;
            }
            // join with a space so tokens never fuse across line boundaries
            if !entered.is_empty() {
                entered.push(' ');
            }
            entered.push_str(&line);
        }
        Some(entered)
    }
}

#[async_trait]
impl Intercept for Interactive {
    async fn transform(&self, data: Option<Bytes>) -> Option<Payload> {
        let Some(original) = data else {
            return Some(Payload::Text(String::new()));
        };

        let rule = "=".repeat(SEPARATOR_WIDTH);
        self.console.write_line(&rule).await;
        for line in dump::render(&original) {
            self.console.write_line(&line).await;
        }
        self.console.write_line(&rule).await;

        let answer = self.console.prompt("Do you want to edit data above? y/N ").await;
        let wants_edit = matches!(&answer, Some(a) if a.contains('y') || a.contains('Y'));
        if !wants_edit {
            return Some(Payload::Bytes(original));
        }

        // interrupted mid-entry keeps the original data
        let Some(entered) = self.read_replacement().await else {
            return Some(Payload::Bytes(original));
        };

        match hex::decode(&entered) {
            Some(replacement) => Some(Payload::Bytes(replacement)),
            None => {
                error!("Failed to decode operator-provided data");
                Some(Payload::Bytes(Bytes::new()))
            }
        }
    }
}
