//! CLI route: single route table and run context. Dispatches to the course API,
//! the draft/commit pipeline and presentation.

use crate::api::CourseApi;
use crate::cli::parse::{
    CardCommands, Commands, CourseCommands, DraftCommands, LessonCommands,
};
use crate::cli::presentation::{
    format_children, format_courses, format_created, format_draft, format_drafts,
    format_outcome, OutputFormat,
};
use crate::concurrency::ContainerLockManager;
use crate::config::{CardwrightConfig, ConfigLoader, StorageBackend};
use crate::error::{ApiError, StorageError};
use crate::generation::{DraftCommitPipeline, GenerationBackends, GenerationRequest, PlanRequest};
use crate::store::{MemoryCourseStore, SledCourseStore};
use crate::types::{CardContent, ContainerRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace, resolved owner and domain facades.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    api: Arc<CourseApi>,
    pipeline: DraftCommitPipeline,
    owner: String,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        owner: Option<String>,
    ) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::from_config(workspace_root, &config, owner.as_deref())
    }

    /// Create run context from an already loaded configuration.
    pub fn from_config(
        workspace_root: PathBuf,
        config: &CardwrightConfig,
        owner: Option<&str>,
    ) -> Result<Self, ApiError> {
        config.ensure_valid()?;

        let locks = Arc::new(ContainerLockManager::new());
        let api = match config.storage.backend {
            StorageBackend::Sled => {
                let store_path = resolve_store_path(&workspace_root, &config.storage.path);
                std::fs::create_dir_all(&store_path).map_err(StorageError::IoError)?;
                debug!(path = %store_path.display(), "Opening sled store");
                CourseApi::new(Arc::new(SledCourseStore::open(&store_path)?), locks)
            }
            StorageBackend::Memory => CourseApi::new(Arc::new(MemoryCourseStore::new()), locks),
        };

        let backends =
            GenerationBackends::for_mode(config.generation.mode, config.provider.as_ref())?;
        let pipeline = api
            .pipeline(backends, config.generation.retry_policy())
            .with_default_concurrency(config.generation.concurrency.clone());

        Ok(Self {
            api: Arc::new(api),
            pipeline,
            owner: config.resolve_owner(owner),
            workspace_root,
        })
    }

    /// Reference to the underlying course API.
    pub fn api(&self) -> &CourseApi {
        &self.api
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command).await;
        info!(
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Course { command } => self.handle_course(command),
            Commands::Lesson { command } => self.handle_lesson(command),
            Commands::Card { command } => self.handle_card(command),
            Commands::Generate {
                lesson,
                count,
                title,
                context,
                concurrency,
                draft_only,
                format,
            } => {
                let format = OutputFormat::parse(format)?;
                let lesson_title = match title {
                    Some(title) => title.clone(),
                    None => self.api.lesson_title(*lesson)?,
                };
                let request = GenerationRequest {
                    lesson: ContainerRef::lesson(*lesson),
                    plan: PlanRequest {
                        lesson_title,
                        desired_count: *count,
                        context: context.clone(),
                    },
                    concurrency: concurrency.clone(),
                };
                let outcome = if *draft_only {
                    self.pipeline.generate_draft(&self.owner, &request).await?
                } else {
                    self.pipeline.generate_and_commit(&self.owner, &request).await?
                };
                format_outcome(&outcome, format)
            }
            Commands::Draft { command } => self.handle_draft(command),
        }
    }

    fn handle_course(&self, command: &CourseCommands) -> Result<String, ApiError> {
        match command {
            CourseCommands::Create { title } => {
                let course = self.api.create_course(title)?;
                Ok(format_created("course", course.id))
            }
            CourseCommands::List { format } => {
                let format = OutputFormat::parse(format)?;
                format_courses(&self.api.list_courses()?, format)
            }
        }
    }

    fn handle_lesson(&self, command: &LessonCommands) -> Result<String, ApiError> {
        match command {
            LessonCommands::Create { course, title } => {
                let id = self.api.create_lesson(*course, title)?;
                Ok(format_created("lesson", id))
            }
            LessonCommands::List { course, format } => {
                let format = OutputFormat::parse(format)?;
                format_children(&self.api.list_lessons(*course)?, format)
            }
            LessonCommands::Reorder { course, ids } => {
                self.api.reorder_lessons(*course, ids)?;
                Ok(format!("Reordered {} lesson(s) in course {}", ids.len(), course))
            }
        }
    }

    fn handle_card(&self, command: &CardCommands) -> Result<String, ApiError> {
        match command {
            CardCommands::Add {
                lesson,
                card_type,
                title,
                body,
            } => {
                let id = self
                    .api
                    .add_card(*lesson, CardContent::new(*card_type, title.as_str(), body.as_str()))?;
                Ok(format_created("card", id))
            }
            CardCommands::List { lesson, format } => {
                let format = OutputFormat::parse(format)?;
                format_children(&self.api.list_cards(*lesson)?, format)
            }
            CardCommands::Reorder { lesson, ids } => {
                self.api.reorder_cards(*lesson, ids)?;
                Ok(format!("Reordered {} card(s) in lesson {}", ids.len(), lesson))
            }
        }
    }

    fn handle_draft(&self, command: &DraftCommands) -> Result<String, ApiError> {
        match command {
            DraftCommands::List { format } => {
                let format = OutputFormat::parse(format)?;
                format_drafts(&self.pipeline.list_drafts(&self.owner)?, format)
            }
            DraftCommands::Show { draft_id, format } => {
                let format = OutputFormat::parse(format)?;
                format_draft(&self.pipeline.get_draft(&self.owner, draft_id)?, format)
            }
            DraftCommands::Commit {
                draft_id,
                select,
                format,
            } => {
                let format = OutputFormat::parse(format)?;
                let outcome =
                    self.pipeline
                        .commit_draft(&self.owner, draft_id, select.as_deref())?;
                format_outcome(&outcome, format)
            }
        }
    }
}

fn resolve_store_path(workspace_root: &Path, configured: &Path) -> PathBuf {
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        workspace_root.join(configured)
    }
}
