//! Course, lesson and card presentation.

use super::{to_json, OutputFormat};
use crate::error::ApiError;
use crate::store::{ChildPayload, ChildRow, CourseRecord};
use comfy_table::Table;
use serde_json::json;

pub fn format_courses(courses: &[CourseRecord], format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        return to_json(courses);
    }
    if courses.is_empty() {
        return Ok("No courses found.\n\nUse 'cardwright course create <title>' to add one.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["ID", "Title"]);
    for course in courses {
        table.add_row(vec![course.id.to_string(), course.title.clone()]);
    }
    Ok(table.to_string())
}

/// Lessons of a course or cards of a lesson, in position order.
pub fn format_children(rows: &[ChildRow], format: OutputFormat) -> Result<String, ApiError> {
    if format == OutputFormat::Json {
        let arr: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| match &row.payload {
                ChildPayload::Lesson(lesson) => json!({
                    "id": row.id,
                    "position": row.position,
                    "title": lesson.title,
                }),
                ChildPayload::Card(card) => json!({
                    "id": row.id,
                    "position": row.position,
                    "type": card.card_type,
                    "title": card.title,
                    "body": card.body,
                    "generation_error": card.generation_error,
                }),
            })
            .collect();
        return to_json(&arr);
    }
    if rows.is_empty() {
        return Ok("Empty.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    let has_cards = rows.iter().any(|r| matches!(r.payload, ChildPayload::Card(_)));
    if has_cards {
        table.set_header(vec!["Pos", "ID", "Type", "Title", "Status"]);
    } else {
        table.set_header(vec!["Pos", "ID", "Title"]);
    }
    for row in rows {
        match &row.payload {
            ChildPayload::Lesson(lesson) => {
                table.add_row(vec![
                    row.position.to_string(),
                    row.id.to_string(),
                    lesson.title.clone(),
                ]);
            }
            ChildPayload::Card(card) => {
                let status = if card.is_placeholder() { "placeholder" } else { "ok" };
                table.add_row(vec![
                    row.position.to_string(),
                    row.id.to_string(),
                    card.card_type.to_string(),
                    card.title.clone(),
                    status.to_string(),
                ]);
            }
        }
    }
    Ok(table.to_string())
}

/// Confirmation for a create/add command.
pub fn format_created(what: &str, id: u64) -> String {
    format!("Created {} {}", what, id)
}
