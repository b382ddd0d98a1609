//! `askai ask`: one question, streamed to stdout.

use tokio::sync::broadcast::error::RecvError;

use askai_core::orchestrator::RunOutcome;

use crate::cli::render::{StreamPrinter, print_sources, waiting_spinner};
use crate::state::AppState;

/// Ask `question` once and print the answer as it streams in.
///
/// Ctrl+C cancels the request. With `--json` nothing is streamed; a single
/// JSON object is printed at the end.
pub async fn ask(state: &AppState, question: &str, json: bool, quiet: bool) -> anyhow::Result<()> {
    let session = state.session()?;
    let mut updates = session.subscribe();
    let spinner = waiting_spinner(json || quiet);
    let mut printer = StreamPrinter::new();

    let run = session.ask_now(question);
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            result = &mut run => break result,
            update = updates.recv() => match update {
                Ok(update) if !json && !update.is_final => {
                    spinner.finish_and_clear();
                    printer.print(&update.answer)?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "renderer fell behind the answer stream");
                }
                Err(RecvError::Closed) => break (&mut run).await,
            },
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
            }
        }
    };
    spinner.finish_and_clear();

    match result {
        Ok(RunOutcome::Answered { answer, from_cache }) => {
            if json {
                let output = serde_json::json!({
                    "question": question,
                    "answer": answer.answer,
                    "sources": answer.sources,
                    "from_cache": from_cache,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            printer.print(&answer.answer)?;
            printer.finish();
            if !quiet {
                print_sources(&answer.sources);
            }
            Ok(())
        }
        Ok(RunOutcome::NoQuestion) => anyhow::bail!("nothing to ask: the question is empty"),
        Ok(RunOutcome::Superseded) => Ok(()),
        Err(notice) => {
            printer.finish();
            if json {
                let output = serde_json::json!({
                    "question": question,
                    "error": notice.message(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            Err(notice.into())
        }
    }
}
