//! Chat assistant command.
//!
//! # Usage
//!
//! ```bash
//! # One-shot
//! lavande chat "Bao lâu thì giao hàng?"
//!
//! # Interactive session; an empty line exits
//! lavande chat
//! ```

use tokio::io::{AsyncBufReadExt, BufReader};

use lavande_client::api::chat::FALLBACK_ANSWER;

use super::CommandContext;

/// Ask the assistant, one-shot or interactively.
pub async fn run(ctx: &CommandContext, question: Option<&str>) -> Result<(), std::io::Error> {
    if let Some(question) = question {
        answer(ctx, question).await;
        return Ok(());
    }

    tracing::info!("Chat with the Lavande assistant. Empty line to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            break;
        }
        answer(ctx, question).await;
    }
    Ok(())
}

/// Ask one question. A failed call degrades to the canned apology instead
/// of surfacing an error.
async fn answer(ctx: &CommandContext, question: &str) {
    match ctx.api.ask(question).await {
        Ok(text) => tracing::info!("{}", text),
        Err(e) => {
            tracing::debug!("Chat request failed: {}", e);
            tracing::info!("{}", FALLBACK_ANSWER);
        }
    }
}
