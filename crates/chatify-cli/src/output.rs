use chatify_chat::{ChatEvent, SendHandle, SendOutcome, TranscriptEntry};
use chatify_core::conversation::Conversation;
use chatify_core::message::Role;
use std::io::{self, Write};

/// Prints a send's live updates until its event channel closes.
///
/// Each update carries the full text so far; only the part not yet printed is
/// written. With `interruptible`, Ctrl-C cancels the send instead of exiting.
pub async fn render_stream(handle: &mut SendHandle, quiet: bool, interruptible: bool) {
    let mut printed = 0usize;
    let mut waiting = !quiet;
    let mut rate = None;

    if waiting {
        eprint!("\x1b[90mWaiting...\x1b[0m");
        io::stderr().flush().ok();
    }

    loop {
        let event = tokio::select! {
            event = handle.events.recv() => event,
            _ = tokio::signal::ctrl_c(), if interruptible => {
                handle.cancel();
                continue;
            }
        };
        let Some(event) = event else { break };

        match event {
            ChatEvent::Render(update) => {
                if waiting {
                    eprint!("\r\x1b[K");
                    waiting = false;
                }
                if let Some(suffix) = update.text.get(printed..) {
                    print!("{suffix}");
                    io::stdout().flush().ok();
                    printed = update.text.len();
                }
                if update.is_final {
                    rate = update.tokens_per_second;
                }
            }
            ChatEvent::Failed { .. } | ChatEvent::Cancelled if waiting => {
                eprint!("\r\x1b[K");
                waiting = false;
            }
            _ => {}
        }
    }

    if printed > 0 {
        println!();
    }
    if !quiet {
        if let Some(rate) = rate {
            eprintln!("\x1b[90m[{rate:.1} tok/s]\x1b[0m");
        }
    }
}

pub fn report_outcome(outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Reconciled { .. } => {}
        SendOutcome::Failed(e) => eprintln!("\x1b[31;1m[error]\x1b[0m {e}"),
        SendOutcome::PersistFailed(e) => {
            eprintln!("\x1b[33;1m[not saved]\x1b[0m {e}")
        }
        SendOutcome::Cancelled => eprintln!("\x1b[90m[cancelled]\x1b[0m"),
    }
}

pub fn print_history(entries: &[TranscriptEntry]) {
    if entries.is_empty() {
        eprintln!("  \x1b[90m(no messages yet)\x1b[0m\n");
        return;
    }
    for entry in entries {
        let label = match entry.role {
            Role::User => "\x1b[1;32myou\x1b[0m",
            Role::Assistant => "\x1b[1;36massistant\x1b[0m",
        };
        let marker = if entry.is_provisional() {
            " \x1b[33m(unsaved)\x1b[0m"
        } else {
            ""
        };
        eprintln!("  {label}{marker}: {}", entry.content);
    }
    eprintln!();
}

pub fn print_conversations(conversations: &[Conversation], current: &str) {
    if conversations.is_empty() {
        eprintln!("  \x1b[90m(no conversations)\x1b[0m\n");
        return;
    }
    for c in conversations {
        let marker = if c.id == current { " ←" } else { "" };
        eprintln!(
            "    \x1b[90m{}\x1b[0m {}{}  \x1b[90m{}\x1b[0m",
            short_id(&c.id),
            c.title,
            marker,
            c.updated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    eprintln!();
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
