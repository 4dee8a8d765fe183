//! Multi-turn conversation command with persistent sessions.
//!
//! Replies are printed as they stream in; the reader is polled for each
//! change and only the newly appended text is written.

use std::io::Write;

use chatrs_config::Config;
use chatrs_conversation::{
    CycleOutcome, DisplayEntry, SessionContext, SessionController, StreamReader,
};
use chatrs_core::Role;
use chatrs_providers::OpenAiProvider;
use chatrs_store::SqlChatStore;
use tracing::{debug, info};

use super::{
    build_conversation_config, build_credentials, build_provider, format_entry, open_store,
};

type Session = SessionController<OpenAiProvider, SqlChatStore>;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Session to resume; a new one is generated when omitted
    pub session_id: Option<String>,
    /// Single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Model override
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        let provider = build_provider(&config, input.model);
        let credentials = build_credentials(&config)?;
        let store = open_store(&config).await?;

        let mut context = input
            .session_id
            .map_or_else(SessionContext::generate, SessionContext::new);
        if let Some(owner) = &config.user.id {
            context = context.with_owner(owner.clone());
        }

        let session = SessionController::builder(provider, store, credentials)
            .config(build_conversation_config(&config))
            .context(context)
            .open()
            .await?;

        info!("Starting conversation session: {}", session.session_id());

        let interactive = input.message.is_none();
        for line in opening_lines(session.session_id(), interactive, &session.display()) {
            println!("{line}");
        }

        if let Some(msg) = input.message {
            send(&session, &msg).await?;
        } else {
            run_interactive(&session).await?;
        }

        Ok(())
    }
}

/// Banner (interactive mode only) followed by the rehydrated history.
fn opening_lines(session_id: &str, interactive: bool, history: &[DisplayEntry]) -> Vec<String> {
    let mut lines = Vec::with_capacity(history.len() + 2);
    if interactive {
        lines.push(format!("=== Conversation Session: {session_id} ==="));
        lines.push("Type 'exit', 'quit', or Ctrl+C to end the session.\n".to_string());
    }
    lines.extend(history.iter().map(format_entry));
    lines
}

async fn run_interactive(session: &Session) -> anyhow::Result<()> {
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        if matches!(line, "exit" | "quit" | "q") {
            break;
        }

        send(session, line).await?;
    }

    let state = session.state();
    println!(
        "\nSession {} ended. {} messages, {} replies",
        session.session_id(),
        state.count_role(Role::User),
        state.count_role(Role::Assistant)
    );
    Ok(())
}

async fn send(session: &Session, text: &str) -> anyhow::Result<()> {
    let Some(submission) = session.submit(text).await? else {
        return Ok(());
    };

    match submission.reply.content.as_stream() {
        Some(reader) => {
            print_stream(reader.clone()).await?;
        }
        None => eprintln!("{}", submission.reply.content.text()),
    }

    match submission.finished().await {
        CycleOutcome::Completed { persisted, .. } => {
            debug!("Reply complete, persisted: {persisted}");
        }
        CycleOutcome::Failed { reason } => {
            debug!("Reply failed: {reason}");
        }
    }
    println!();
    Ok(())
}

/// Write each newly streamed suffix to stdout until the stream terminates.
async fn print_stream(mut reader: StreamReader) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;

    loop {
        let open = reader.is_open();
        let text = reader.text();
        if text.len() > printed {
            write!(stdout, "{}", &text[printed..])?;
            stdout.flush()?;
            printed = text.len();
        }
        if !open || !reader.changed().await {
            break;
        }
    }

    if let Err(reason) = reader.finished().await {
        debug!("Stream ended early: {reason}");
        eprintln!("\n{}", chatrs_conversation::ERROR_NOTICE);
    }
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrs_conversation::{EntryKind, reconstruct};
    use chatrs_core::{ConversationState, Turn};

    fn history() -> Vec<DisplayEntry> {
        let mut state = ConversationState::new("s1");
        state.append(Turn::user("earlier question"));
        state.append(Turn::assistant("earlier answer"));
        reconstruct(&state)
    }

    #[test]
    fn single_message_mode_still_prints_history() {
        let lines = opening_lines("s1", false, &history());
        assert_eq!(
            lines,
            vec![
                "[you] earlier question\n".to_string(),
                "[assistant] earlier answer\n".to_string(),
            ]
        );
    }

    #[test]
    fn interactive_mode_prints_banner_then_history() {
        let lines = opening_lines("s1", true, &history());
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("s1"));
        assert_eq!(lines[3], "[assistant] earlier answer\n");
    }

    #[test]
    fn notice_entries_are_labelled() {
        let entry = DisplayEntry::text("n1", EntryKind::Notice, "Error");
        assert_eq!(format_entry(&entry), "[notice] Error\n");
    }
}
