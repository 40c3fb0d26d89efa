//! Text rendering of telemetry records and run summaries.

use sluice_runtime::{StatsSnapshot, TelemetryRecord};

/// One line per telemetry record.
pub fn format_record(record: &TelemetryRecord) -> String {
    let composition = record.composition();
    match record {
        TelemetryRecord::NodeExecutionStarted { node, .. } => {
            format!("[{composition}] start  {node}")
        }
        TelemetryRecord::NodeExecutionFinished { node, .. } => {
            format!("[{composition}] finish {node}")
        }
        TelemetryRecord::PortUpdated {
            port,
            sent_event,
            sent_data,
            summary,
            ..
        } => {
            let what = match (sent_event, sent_data) {
                (true, true) => "event+data",
                (true, false) => "event",
                (false, true) => "data",
                (false, false) => "-",
            };
            match summary {
                Some(summary) => format!("[{composition}] port   {port} {what} = {summary}"),
                None => format!("[{composition}] port   {port} {what}"),
            }
        }
        TelemetryRecord::EventDropped { port, .. } => {
            format!("[{composition}] drop   {port}")
        }
        TelemetryRecord::ErrorOccurred { message, .. } => {
            format!("[{composition}] error  {message}")
        }
        TelemetryRecord::CompositionStopping { .. } => format!("[{composition}] stopping"),
    }
}

/// Multi-line counter summary.
pub fn format_stats(stats: &StatsSnapshot) -> String {
    format!(
        "  Admitted:   {} ({} queued)\n  Dropped:    {}\n  Completed:  {}\n  Discarded:  {}\n  Executions: {} ({} feedback)",
        stats.admitted,
        stats.queued,
        stats.dropped,
        stats.completed,
        stats.discarded,
        stats.node_executions,
        stats.feedback_executions
    )
}
