//! `askai chat`: interactive conversation loop.
//!
//! Each line is submitted through the session's debounced `ask`, so the
//! conversation window, cache, and supersede rules apply exactly as they do
//! for any other front end. Rendering follows the answer bus.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use askai_core::session::AskSession;
use askai_types::query::{AnswerUpdate, Sender};

use crate::cli::render::{StreamPrinter, print_sources, waiting_spinner};
use crate::state::AppState;

/// Run the interactive loop until `/quit`, end of input, or Ctrl+C at the prompt.
pub async fn chat(state: &AppState, quiet: bool) -> anyhow::Result<()> {
    let session = state.session()?;
    let mut updates = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !quiet {
        println!();
        println!(
            "  {} connected to {}",
            console::style("askai").bold().cyan(),
            console::style(&state.config.base_url).dim()
        );
        println!(
            "  {}",
            console::style("/end resets the conversation, /sources lists sources, /quit exits").dim()
        );
        println!();
    }

    loop {
        print!("{} ", console::style("you>").green().bold());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/end" => {
                session.end();
                println!("  {}", console::style("Conversation cleared.").dim());
                continue;
            }
            "/sources" => {
                print_sources(&session.last_sources());
                continue;
            }
            "/history" => {
                for message in session.messages() {
                    let who = match message.sender {
                        Sender::User => console::style("you").green(),
                        Sender::Assistant => console::style("ai ").cyan(),
                    };
                    println!("  {who} {}", message.text);
                }
                continue;
            }
            question => {
                let handle = session.ask(question);
                answer_turn(&session, &mut updates, handle, quiet).await?;
            }
        }
    }

    session.end();
    Ok(())
}

/// Render bus updates until the turn's final update, or until the debounced
/// run finishes without publishing anything.
async fn answer_turn(
    session: &AskSession,
    updates: &mut broadcast::Receiver<AnswerUpdate>,
    mut handle: JoinHandle<()>,
    quiet: bool,
) -> anyhow::Result<()> {
    let spinner = waiting_spinner(quiet);
    let mut printer = StreamPrinter::new();
    let mut run_finished = false;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    spinner.finish_and_clear();
                    printer.print(&update.answer)?;
                    if update.is_final {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "renderer fell behind the answer stream");
                }
                Err(RecvError::Closed) => break,
            },
            joined = &mut handle, if !run_finished => {
                joined?;
                run_finished = true;
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }

        if run_finished && updates.is_empty() {
            break;
        }
    }

    spinner.finish_and_clear();
    printer.finish();
    if !quiet {
        print_sources(&session.last_sources());
    }
    println!();
    Ok(())
}
