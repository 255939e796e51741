use anyhow::Result;
use chatify_chat::ChatView;
use chatify_core::conversation::Conversation;
use std::future::Future;
use std::io::{self, BufRead, Write};

use super::output::{self, short_id};
use super::App;

/// What the prompt produced.
#[derive(Debug, PartialEq)]
enum Input {
    Line(String),
    Eof,
    Interrupted,
}

/// Read a line from stdin, handling non-UTF-8 bytes gracefully
fn read_line_lossy() -> Result<Option<String>> {
    let stdin = io::stdin();
    let mut buf = Vec::new();
    match stdin.lock().read_until(b'\n', &mut buf) {
        Ok(0) => Ok(None), // EOF
        Ok(_) => Ok(Some(String::from_utf8_lossy(&buf).trim().to_string())),
        Err(e) => Err(anyhow::anyhow!("Input error: {e}")),
    }
}

/// Races a pending line read against an interrupt.
async fn next_input<R, I>(read: R, interrupt: I) -> Result<Input>
where
    R: Future<Output = Result<Option<String>>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        line = read => Ok(match line? {
            Some(line) => Input::Line(line),
            None => Input::Eof,
        }),
        _ = interrupt => Ok(Input::Interrupted),
    }
}

async fn read_prompt() -> Result<Input> {
    eprint!("  \x1b[1;32mchat>\x1b[0m ");
    io::stderr().flush().ok();

    let read = async {
        tokio::task::spawn_blocking(read_line_lossy)
            .await
            .map_err(|e| anyhow::anyhow!("Input error: {e}"))?
    };
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    next_input(read, interrupt).await
}

fn print_help() {
    eprintln!("\n  \x1b[1mCommands:\x1b[0m");
    eprintln!("    /new [title]      Start a new conversation");
    eprintln!("    /list             List your conversations");
    eprintln!("    /switch <id>      Open another conversation (id or prefix)");
    eprintln!("    /rename <title>   Rename the current conversation");
    eprintln!("    /delete           Delete the current conversation");
    eprintln!("    /history          Show the current transcript");
    eprintln!("    /exit             Exit\n");
}

/// Matches `query` against the user's conversations by exact id, then by
/// unique id prefix.
async fn resolve_conversation(app: &App, query: &str) -> Result<Conversation> {
    let conversations = app.store().list_conversations(&app.user.id).await?;
    if let Some(exact) = conversations.iter().find(|c| c.id == query) {
        return Ok(exact.clone());
    }
    let mut matches = conversations.into_iter().filter(|c| c.id.starts_with(query));
    match (matches.next(), matches.next()) {
        (Some(found), None) => Ok(found),
        (Some(_), Some(_)) => anyhow::bail!("'{query}' matches more than one conversation"),
        (None, _) => Err(chatify_core::error::ChatError::ConversationNotFound(query.to_string()).into()),
    }
}

fn announce(conversation: &Conversation) {
    eprintln!(
        "  \x1b[90mConversation: {} \x1b[0m{}\n",
        short_id(&conversation.id),
        conversation.title
    );
}

pub async fn run(app: &App, resume: Option<String>) -> Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[1;35mChatify\x1b[0m v{} \x1b[90m(\x1b[1;36m{}\x1b[90m as {})\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        app.ctx.proxy.name(),
        app.user.id,
    );
    eprintln!("  \x1b[90mData: {}\x1b[0m", app.config.data_path().display());
    eprintln!("  \x1b[90mType a message, /help for commands, Ctrl-C cancels a reply or exits at the prompt\x1b[0m");
    eprintln!();

    let mut conversation = match resume {
        Some(id) => app.find_conversation(&id).await?,
        None => app.store().create_conversation(&app.user.id, None).await?,
    };
    let mut view: ChatView = app.open_view(&conversation).await?;
    announce(&conversation);

    // Main loop
    loop {
        let line = match read_prompt().await? {
            Input::Eof => {
                eprintln!("\n  \x1b[90mGoodbye!\x1b[0m");
                break;
            }
            Input::Interrupted => {
                eprintln!("\n  \x1b[90mGoodbye!\x1b[0m");
                // The stdin reader thread stays blocked, so leave without
                // waiting for runtime shutdown
                std::process::exit(130);
            }
            Input::Line(l) if l.is_empty() => continue,
            Input::Line(l) => l,
        };

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = match command.split_once(char::is_whitespace) {
                Some((name, arg)) => (name, arg.trim()),
                None => (command, ""),
            };
            match name {
                "help" | "h" => print_help(),
                "exit" | "quit" | "q" => {
                    eprintln!("  \x1b[90mGoodbye!\x1b[0m");
                    break;
                }
                "new" => {
                    let title = (!arg.is_empty()).then_some(arg);
                    conversation = app.store().create_conversation(&app.user.id, title).await?;
                    view = app.open_view(&conversation).await?;
                    announce(&conversation);
                }
                "list" | "ls" => {
                    let conversations = app.store().list_conversations(&app.user.id).await?;
                    output::print_conversations(&conversations, &conversation.id);
                }
                "switch" if arg.is_empty() => eprintln!("  Usage: /switch <id>\n"),
                "switch" => match resolve_conversation(app, arg).await {
                    Ok(found) => {
                        conversation = found;
                        view = app.open_view(&conversation).await?;
                        announce(&conversation);
                        output::print_history(&view.snapshot().entries);
                    }
                    Err(e) => eprintln!("  \x1b[31m{e}\x1b[0m\n"),
                },
                "rename" if arg.is_empty() => eprintln!("  Usage: /rename <title>\n"),
                "rename" => match app.store().rename_conversation(&conversation.id, arg).await {
                    Ok(()) => {
                        conversation.title = arg.to_string();
                        eprintln!("  \x1b[32m✓\x1b[0m Renamed.\n");
                    }
                    Err(e) => eprintln!("  \x1b[31m{e}\x1b[0m\n"),
                },
                "delete" => {
                    app.store().delete_conversation(&conversation.id).await?;
                    eprintln!("  \x1b[32m✓\x1b[0m Deleted {}.", short_id(&conversation.id));
                    conversation = app.store().create_conversation(&app.user.id, None).await?;
                    view = app.open_view(&conversation).await?;
                    announce(&conversation);
                }
                "history" => output::print_history(&view.snapshot().entries),
                _ => eprintln!("  Unknown command. Type /help\n"),
            }
            continue;
        }

        let mut handle = match view.send(&line) {
            Ok(handle) => handle,
            Err(e) => {
                eprintln!("  \x1b[31m{e}\x1b[0m\n");
                continue;
            }
        };
        eprintln!();
        output::render_stream(&mut handle, false, true).await;
        let outcome = handle.outcome().await;
        output::report_outcome(&outcome);
        eprintln!();
    }

    Ok(())
}
