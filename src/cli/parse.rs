//! CLI parse: clap types for cardwright. No behavior; definitions only.

use crate::types::CardType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cardwright CLI - ordered course content and AI card generation
#[derive(Parser)]
#[command(name = "cardwright")]
#[command(about = "Ordered course content storage with concurrent AI card generation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Owner recorded on drafts (defaults to config, then $USER)
    #[arg(long)]
    pub owner: Option<String>,

    /// Disable logging entirely
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage courses
    Course {
        #[command(subcommand)]
        command: CourseCommands,
    },
    /// Manage the lessons of a course
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },
    /// Manage the cards of a lesson
    Card {
        #[command(subcommand)]
        command: CardCommands,
    },
    /// Plan and generate cards for a lesson
    Generate {
        /// Target lesson id
        lesson: u64,
        /// Number of cards to ask the planner for
        #[arg(long, default_value = "5")]
        count: usize,
        /// Planning title (defaults to the lesson title)
        #[arg(long)]
        title: Option<String>,
        /// Extra context for the planner
        #[arg(long)]
        context: Option<String>,
        /// Maximum generation calls in flight (falls back to 4 when invalid)
        #[arg(long)]
        concurrency: Option<String>,
        /// Keep the result as a draft instead of committing it
        #[arg(long)]
        draft_only: bool,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Review and commit generation drafts
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
}

#[derive(Subcommand)]
pub enum CourseCommands {
    /// Create a course
    Create {
        title: String,
    },
    /// List courses
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum LessonCommands {
    /// Append a lesson to a course
    Create {
        course: u64,
        title: String,
    },
    /// List the lessons of a course in order
    List {
        course: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reorder lessons; ids must be a permutation of the course's lessons
    Reorder {
        course: u64,
        /// Lesson ids in their new order (comma separated)
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<u64>,
    },
}

#[derive(Subcommand)]
pub enum CardCommands {
    /// Append a hand-written card to a lesson
    Add {
        lesson: u64,
        /// Card type (explanation, flashcard, quiz, exercise)
        #[arg(long = "type", value_parser = parse_card_type, default_value = "explanation")]
        card_type: CardType,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// List the cards of a lesson in order
    List {
        lesson: u64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Reorder cards; ids must be a permutation of the lesson's cards
    Reorder {
        lesson: u64,
        /// Card ids in their new order (comma separated)
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<u64>,
    },
}

#[derive(Subcommand)]
pub enum DraftCommands {
    /// List your drafts
    List {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the cards of a draft
    Show {
        draft_id: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Commit a draft into its lesson
    Commit {
        draft_id: String,
        /// Plan indices to commit (comma separated, 0-based); all when omitted
        #[arg(long, value_delimiter = ',')]
        select: Option<Vec<usize>>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn parse_card_type(value: &str) -> Result<CardType, String> {
    CardType::parse(value).ok_or_else(|| {
        format!(
            "unknown card type '{}' (expected one of: {})",
            value,
            CardType::ALL.map(CardType::as_str).join(", ")
        )
    })
}
