//! `inline-agent trace`: saved trace captures.

use anyhow::{Context, Result};
use inline_agent_observability::TraceCapture;

use crate::cli::TraceAction;
use crate::output;

pub fn handle(action: TraceAction) -> Result<()> {
    match action {
        TraceAction::Show { file } => {
            let capture = TraceCapture::load(&file)
                .with_context(|| format!("reading capture {}", file.display()))?;
            show(&capture)
        }
    }
}

fn show(capture: &TraceCapture) -> Result<()> {
    if output::is_json() {
        output::json_pretty(&serde_json::to_value(capture)?);
        return Ok(());
    }

    output::header(&capture.span_name);
    output::kv("Trace:", &capture.trace_id);
    output::kv("Span:", &capture.span_id);
    output::kv("Status:", capture.status.as_str());
    output::kv("Started:", &capture.started_at.to_rfc3339());
    output::kv("Duration:", &format!("{}ms", capture.duration_ms));
    if let Some(session) = capture.session_id() {
        output::kv("Session:", session);
    }
    output::kv("Response:", capture.response.kind.as_str());
    output::kv("Events:", &capture.response.event_count.to_string());

    println!();
    output::header("Attributes");
    for (key, value) in &capture.attributes {
        output::kv(key, value);
    }

    if !capture.response.completion.is_empty() {
        println!();
        output::header("Completion");
        println!("{}", capture.response.completion);
    }
    output::verbose(&capture.to_pretty_json()?);
    Ok(())
}
