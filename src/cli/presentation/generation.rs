//! Generation outcome and draft presentation.

use super::{to_json, OutputFormat};
use crate::error::ApiError;
use crate::generation::GenerationOutcome;
use crate::store::Draft;
use crate::types::CardContent;
use comfy_table::Table;
use serde_json::json;

fn cards_table(items: &[CardContent]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Type", "Title", "Status"]);
    for (index, card) in items.iter().enumerate() {
        let status = match &card.generation_error {
            Some(err) => format!("placeholder: {}", err),
            None => "ok".to_string(),
        };
        table.add_row(vec![
            index.to_string(),
            card.card_type.to_string(),
            card.title.clone(),
            status,
        ]);
    }
    table
}

pub fn format_outcome(outcome: &GenerationOutcome, format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(outcome);
    }
    let mut output = String::from("Progress:\n");
    for entry in &outcome.log {
        output.push_str(&format!("  [{}] {}\n", entry.timestamp, entry.text));
    }
    output.push('\n');
    output.push_str(&cards_table(&outcome.items).to_string());
    output.push('\n');
    match &outcome.committed {
        Some(summary) => output.push_str(&format!(
            "\nCommitted {} card(s) from draft {}\n",
            summary.count, outcome.draft_id
        )),
        None => output.push_str(&format!(
            "\nDraft {} saved. Commit it with 'cardwright draft commit {}'\n",
            outcome.draft_id, outcome.draft_id
        )),
    }
    Ok(output)
}

pub fn format_drafts(drafts: &[Draft], format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        let arr: Vec<serde_json::Value> = drafts
            .iter()
            .map(|d| {
                json!({
                    "draft_id": d.draft_id,
                    "target": d.target.to_string(),
                    "lesson_title": d.lesson_title,
                    "cards": d.items.len(),
                    "created_at": d.created_at,
                })
            })
            .collect();
        return to_json(&arr);
    }
    if drafts.is_empty() {
        return Ok("No drafts.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Draft", "Lesson", "Cards", "Created"]);
    for d in drafts {
        table.add_row(vec![
            d.draft_id.clone(),
            format!("{} ({})", d.lesson_title, d.target),
            d.items.len().to_string(),
            d.created_at.clone(),
        ]);
    }
    Ok(table.to_string())
}

pub fn format_draft(draft: &Draft, format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(draft);
    }
    Ok(format!(
        "Draft: {}\nLesson: {} ({})\nCreated: {}\n\n{}",
        draft.draft_id,
        draft.lesson_title,
        draft.target,
        draft.created_at,
        cards_table(&draft.items)
    ))
}
