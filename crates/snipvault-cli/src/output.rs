//! Table and JSON rendering.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use snipvault_core::access::GateState;
use snipvault_core::{ImportReport, PinStatus, Snippet, StoreStats};

const BODY_PREVIEW_CHARS: usize = 40;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// First line of the body, shortened.
fn preview(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    let mut preview: String = line.chars().take(BODY_PREVIEW_CHARS).collect();
    if line.chars().count() > BODY_PREVIEW_CHARS || body.lines().nth(1).is_some() {
        preview.push('…');
    }
    preview
}

pub fn snippets_table(snippets: &[Snippet]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Name", "Prefix", "Tags", "Uses", "★", "Body"]);
    for snippet in snippets {
        table.add_row(vec![
            snippet.id.clone(),
            snippet.name.clone(),
            snippet.prefix.clone(),
            snippet.tags.join(", "),
            snippet.usage_count.to_string(),
            if snippet.is_favorite { "★" } else { "" }.to_string(),
            preview(&snippet.body),
        ]);
    }
    table.to_string()
}

pub fn snippet_detail(snippet: &Snippet) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} ({})\n", snippet.name, snippet.prefix));
    out.push_str(&format!("ID:          {}\n", snippet.id));
    if let Some(description) = &snippet.description {
        out.push_str(&format!("Description: {}\n", description));
    }
    if !snippet.tags.is_empty() {
        out.push_str(&format!("Tags:        {}\n", snippet.tags.join(", ")));
    }
    if !snippet.file_types.is_empty() {
        out.push_str(&format!("File types:  {}\n", snippet.file_types.join(", ")));
    }
    out.push_str(&format!("Scope:       {}\n", snippet.scope));
    if let Some(folder) = &snippet.folder_id {
        out.push_str(&format!("Folder:      {}\n", folder));
    }
    out.push_str(&format!(
        "Used:        {} time(s){}\n",
        snippet.usage_count,
        if snippet.is_favorite { ", favorite" } else { "" }
    ));
    out.push_str(&format!("Created:     {}\n", snippet.created_at.to_rfc3339()));
    out.push_str(&format!("Updated:     {}\n", snippet.updated_at.to_rfc3339()));
    out.push('\n');
    out.push_str(&snippet.body);
    out
}

pub fn stats_text(stats: &StoreStats) -> String {
    let mut table = new_table();
    table.set_header(vec!["Snippets", "Total uses", "Snapshot bytes"]);
    table.add_row(vec![
        stats.total_snippets.to_string(),
        stats.total_usage.to_string(),
        stats.snapshot_bytes.to_string(),
    ]);
    table.to_string()
}

pub fn import_summary(report: &ImportReport) -> String {
    let mut out = format!("Imported {} snippet(s)", report.imported);
    if report.cleared > 0 {
        out.push_str(&format!(", replaced {}", report.cleared));
    }
    if !report.skipped.is_empty() {
        out.push_str(&format!(", skipped {}", report.skipped.len()));
        for diagnostic in &report.skipped {
            out.push_str(&format!("\n  #{}: {}", diagnostic.index, diagnostic.reason));
        }
    }
    out
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinStatusView {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<String>,
    pub failed_attempts: u32,
}

impl From<&PinStatus> for PinStatusView {
    fn from(status: &PinStatus) -> Self {
        let (expires_at, locked_until) = match status.state {
            GateState::Unlocked { expires_at } => (Some(expires_at.to_rfc3339()), None),
            GateState::LockedOut { until } => (None, Some(until.to_rfc3339())),
            GateState::Disabled | GateState::NeedsVerification => (None, None),
        };
        Self {
            state: status.state.label(),
            expires_at,
            locked_until,
            failed_attempts: status.session.failed_attempts,
        }
    }
}

pub fn pin_status_text(view: &PinStatusView) -> String {
    let mut out = format!("PIN: {}", view.state);
    if let Some(expires_at) = &view.expires_at {
        out.push_str(&format!("\nSession expires: {}", expires_at));
    }
    if let Some(until) = &view.locked_until {
        out.push_str(&format!("\nLocked until: {}", until));
    }
    if view.failed_attempts > 0 {
        out.push_str(&format!("\nFailed attempts: {}", view.failed_attempts));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use snipvault_core::access::AccessSession;

    #[test]
    fn test_preview_truncates_long_and_multiline_bodies() {
        assert_eq!(preview("short"), "short");
        assert_eq!(preview("first\nsecond"), "first…");
        let long = "x".repeat(60);
        assert_eq!(preview(&long).chars().count(), BODY_PREVIEW_CHARS + 1);
    }

    #[test]
    fn test_pin_status_view_disabled() {
        let status = PinStatus {
            state: GateState::Disabled,
            session: AccessSession::default(),
        };
        let view = PinStatusView::from(&status);
        assert_eq!(view.state, "disabled");
        assert_eq!(pin_status_text(&view), "PIN: disabled");
    }
}
