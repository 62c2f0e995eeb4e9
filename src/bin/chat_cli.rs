use llama_chat_stream::{config::Config, state::AppState};
use std::io::Write;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "llama_chat_stream=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let message = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if message.trim().is_empty() {
        anyhow::bail!("usage: chat_cli <message>");
    }

    let state = AppState::new(Config::from_env()?)?;
    let mut stream = state.chat.stream_response(&message, &[])?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut shown = String::new();
    for snapshot in stream.by_ref() {
        // Snapshots may rewrite their tail, print only the new suffix when possible.
        match snapshot.strip_prefix(shown.as_str()) {
            Some(delta) => write!(out, "{}", delta)?,
            None => write!(out, "\r{}", snapshot)?,
        }
        out.flush()?;
        shown = snapshot;
    }
    writeln!(out)?;

    match stream.termination() {
        Some(termination) if termination.is_completed() => Ok(()),
        Some(termination) => anyhow::bail!("generation ended early: {:?}", termination),
        None => anyhow::bail!("generation ended without termination"),
    }
}
