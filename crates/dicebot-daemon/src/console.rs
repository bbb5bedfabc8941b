//! Console adapter: stdin lines in, stdout lines out.
//!
//! Each line becomes one [`InboundMessage`] from the console user. Words of
//! the form `@id` are taken as mentions.

use async_trait::async_trait;
use colored::Colorize;
use dicebot_core::{
    ConversationId, InboundMessage, Platform, ReplyResult, ReplySurface, Sender, SenderRole, UserId,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Platform tag of console messages.
pub(crate) const CONSOLE_PLATFORM: &str = "console";

/// Who the console user is and where they talk.
#[derive(Debug, Clone)]
pub(crate) struct ConsoleIdentity {
    pub(crate) user: UserId,
    pub(crate) nickname: String,
    pub(crate) role: SenderRole,
    pub(crate) conversation: ConversationId,
    pub(crate) private: bool,
}

impl ConsoleIdentity {
    /// Turn one input line into a message.
    pub(crate) fn message(&self, line: &str) -> InboundMessage {
        let sender = Sender::new(self.user.clone(), self.nickname.clone()).with_role(self.role);
        let mut builder = InboundMessage::builder(
            self.conversation.clone(),
            Platform::new(CONSOLE_PLATFORM),
            sender,
            line,
        );
        if self.private {
            builder = builder.private();
        }
        for word in line.split_whitespace() {
            if let Some(id) = word.strip_prefix('@').filter(|id| !id.is_empty()) {
                builder = builder.mention(UserId::new(id));
            }
        }
        builder.build()
    }
}

/// Read stdin until EOF, forwarding every non-empty line.
pub(crate) async fn read_stdin(identity: ConsoleIdentity, tx: mpsc::Sender<InboundMessage>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send(identity.message(line)).await.is_err() {
                    debug!("Router gone, console reader stopping");
                    break;
                }
            },
            Ok(None) => {
                info!("Console input closed");
                break;
            },
            Err(e) => {
                info!(error = %e, "Console input failed");
                break;
            },
        }
    }
}

/// Prints replies to stdout.
#[derive(Debug, Default)]
pub(crate) struct ConsoleSurface;

#[async_trait]
impl ReplySurface for ConsoleSurface {
    async fn reply_to_sender(&self, message: &InboundMessage, text: &str) -> ReplyResult<()> {
        println!("{} {text}", format!("[to {}]", message.sender.nickname).cyan());
        Ok(())
    }

    async fn notify_operators(&self, text: &str) -> ReplyResult<()> {
        println!("{} {text}", "[notice]".yellow());
        Ok(())
    }

    async fn send_to_conversation(&self, conversation: &ConversationId, text: &str) -> ReplyResult<()> {
        println!("{} {text}", format!("[{conversation}]").green());
        Ok(())
    }

    async fn leave_conversation(&self, conversation: &ConversationId) -> ReplyResult<()> {
        println!("{}", format!("[left {conversation}]").red().bold());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(private: bool) -> ConsoleIdentity {
        ConsoleIdentity {
            user: UserId::new("console:user"),
            nickname: "user".to_string(),
            role: SenderRole::Owner,
            conversation: ConversationId::new("console:group"),
            private,
        }
    }

    #[test]
    fn test_message_collects_mentions() {
        let msg = identity(false).message(".botlist add @QQ:77 @ @x");
        assert!(!msg.is_private());
        assert_eq!(msg.mentions, vec![UserId::new("QQ:77"), UserId::new("x")]);
        assert_eq!(msg.sender.role, SenderRole::Owner);
        assert_eq!(msg.platform.as_str(), CONSOLE_PLATFORM);
    }

    #[test]
    fn test_private_identity_marks_message() {
        assert!(identity(true).message("hi").is_private());
    }
}
