//! Human-readable rendering of catalogs, results, and traces.

use conduit_core::{InvocationOutcome, InvocationResult, ToolDescriptor, TraceDirection, TraceEntry};

/// Print the merged catalog, grouped as a flat table.
pub fn print_catalog(catalog: &[ToolDescriptor]) {
    if catalog.is_empty() {
        println!("No tools available.");
        return;
    }

    let width = catalog.iter().map(|t| t.name.len()).max().unwrap_or(0);
    println!("Available tools:");
    for tool in catalog {
        println!(
            "  {:width$}  [{}]  {}",
            tool.name,
            tool.server,
            tool.description,
            width = width
        );
    }
    println!("\nTotal: {} tool(s)", catalog.len());
}

/// Print one invocation result.
pub fn print_result(result: &InvocationResult) {
    match &result.outcome {
        InvocationOutcome::Success(payload) => {
            let rendered = serde_json::to_string_pretty(payload)
                .unwrap_or_else(|_| payload.to_string());
            println!("{rendered}");
        }
        InvocationOutcome::Failure(error) => {
            eprintln!("error [{:?}]: {}", error.kind, error.detail);
        }
    }
}

/// Replay a recorded trace, one line per entry.
pub fn print_trace(entries: &[TraceEntry]) {
    if entries.is_empty() {
        return;
    }
    eprintln!("--- trace ({} entries) ---", entries.len());
    for entry in entries {
        let arrow = match entry.direction {
            TraceDirection::Request => "->",
            TraceDirection::Response => "<-",
            TraceDirection::Error => "!!",
        };
        let server = entry.server.as_deref().unwrap_or("-");
        eprintln!(
            "{} {} [{}] {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            arrow,
            server,
            entry.payload
        );
    }
}
