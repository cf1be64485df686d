//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; a single route table dispatches to the course API and pipeline.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{CardCommands, Cli, Commands, CourseCommands, DraftCommands, LessonCommands};
pub use presentation::{
    format_children, format_courses, format_created, format_draft, format_drafts,
    format_outcome, OutputFormat,
};
pub use route::RunContext;
