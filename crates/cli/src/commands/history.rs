//! `parley history`: list, show, or delete stored conversations.

use clap::Subcommand;
use parley_agent::ConversationService;
use parley_config::AppConfig;
use parley_core::history::{ChatTurn, ConversationSummary};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List conversations, most recently updated first
    List,

    /// Print every turn of a conversation
    Show { id: String },

    /// Delete a conversation's summary and turns
    Delete { id: String },
}

pub async fn run(config: AppConfig, action: HistoryAction) -> anyhow::Result<()> {
    let store = parley_gateway::open_history(&config).await?;
    let service = ConversationService::new(store);

    match action {
        HistoryAction::List => {
            let summaries = service.list().await?;
            if summaries.is_empty() {
                println!("No conversations yet.");
            }
            for summary in &summaries {
                println!("{}", summary_line(summary));
            }
        }
        HistoryAction::Show { id } => {
            let turns = service.history(&id).await?;
            if turns.is_empty() {
                println!("No turns recorded for '{id}'.");
            }
            for turn in &turns {
                println!("{}", turn_line(turn));
            }
        }
        HistoryAction::Delete { id } => {
            let report = service.delete(&id).await?;
            println!(
                "Deleted '{id}': summary {}, {} turn(s)",
                if report.summary_removed { "removed" } else { "absent" },
                report.turns_removed
            );
        }
    }

    Ok(())
}

fn summary_line(summary: &ConversationSummary) -> String {
    let tag = summary
        .tag
        .as_deref()
        .map(|t| format!(" [{t}]"))
        .unwrap_or_default();
    format!(
        "{}  {}{}  (updated {})",
        summary.conversation_id,
        summary.title,
        tag,
        summary.updated_at.format("%Y-%m-%d %H:%M")
    )
}

fn turn_line(turn: &ChatTurn) -> String {
    format!("{:>9} > {}", turn.role.as_str(), turn.content)
}
