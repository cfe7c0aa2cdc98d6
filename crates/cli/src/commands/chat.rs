//! `parley chat`: send one message through the orchestrator.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use futures::StreamExt;
use parley_agent::{ChatOutcome, ChatRequest};
use parley_config::AppConfig;
use parley_core::message::{ConversationId, MediaAttachment};

pub struct ChatArgs {
    pub message: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub conversation: Option<String>,
    pub system_prompt: Option<String>,
    pub stream: bool,
    pub images: Vec<PathBuf>,
}

fn load_image(path: &PathBuf) -> anyhow::Result<MediaAttachment> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(MediaAttachment::from_filename(&filename, data)?)
}

pub async fn run(config: AppConfig, args: ChatArgs) -> anyhow::Result<()> {
    let state = parley_gateway::build_state(&config).await?;

    let media = args
        .images
        .iter()
        .map(load_image)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let conversation_id = args.conversation.map(ConversationId).unwrap_or_default();

    let mut request = ChatRequest::new(
        args.message,
        conversation_id.clone(),
        args.provider.unwrap_or_else(|| config.default_provider.clone()),
        args.model.unwrap_or_else(|| config.default_model.clone()),
    )
    .streamed(args.stream)
    .with_media(media);
    if let Some(id) = args.system_prompt {
        request = request.with_system_prompt(id);
    }

    eprintln!("  conversation: {conversation_id}");

    match state.orchestrator.execute(request).await? {
        ChatOutcome::Complete(text) => println!("{text}"),
        ChatOutcome::Streamed(mut stream) => {
            let mut stdout = std::io::stdout();
            while let Some(item) = stream.next().await {
                let delta = item?;
                write!(stdout, "{delta}")?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
    }

    Ok(())
}
