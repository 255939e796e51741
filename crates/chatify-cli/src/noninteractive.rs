use anyhow::Result;
use chatify_chat::SendOutcome;
use chatify_core::conversation::title_from_prompt;

pub async fn run(
    app: &super::App,
    prompt: String,
    conversation_id: Option<String>,
    output_format: super::OutputFormat,
    quiet: bool,
) -> Result<()> {
    let conversation = match conversation_id {
        Some(id) => app.find_conversation(&id).await?,
        None => {
            app.store()
                .create_conversation(&app.user.id, Some(&title_from_prompt(&prompt)))
                .await?
        }
    };
    let view = app.open_view(&conversation).await?;
    let mut handle = view.send(&prompt)?;

    match output_format {
        super::OutputFormat::Text => {
            super::output::render_stream(&mut handle, quiet, false).await;
            match handle.outcome().await {
                SendOutcome::Reconciled { .. } => Ok(()),
                SendOutcome::Failed(e) => Err(e.into()),
                SendOutcome::PersistFailed(e) => {
                    anyhow::bail!("answer was not saved: {e}")
                }
                SendOutcome::Cancelled => anyhow::bail!("cancelled"),
            }
        }
        super::OutputFormat::Json => {
            let output = match handle.outcome().await {
                SendOutcome::Reconciled {
                    user,
                    assistant,
                    tokens_per_second,
                } => serde_json::json!({
                    "content": assistant.content,
                    "tokens_per_second": tokens_per_second,
                    "conversation_id": conversation.id,
                    "user_message_id": user.id,
                    "assistant_message_id": assistant.id,
                }),
                SendOutcome::Failed(e) => serde_json::json!({ "error": e.to_string() }),
                SendOutcome::PersistFailed(e) => serde_json::json!({
                    "error": format!("answer was not saved: {e}"),
                    "conversation_id": conversation.id,
                }),
                SendOutcome::Cancelled => serde_json::json!({ "error": "cancelled" }),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}
