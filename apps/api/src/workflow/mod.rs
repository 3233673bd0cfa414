//! The radio show pipeline:
//!
//! 1. `fetch_masterdata` snapshots a feed, enriches each book and stores the
//!    batch as one masterdata artifact, then creates a `RadioShow` and hands
//!    off to step 2 through the task queue.
//! 2. `run_agent_and_tts` turns the day's books into a script and audio.

mod masterdata;
mod script;
mod user;

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::info;

use crate::blob::{BlobError, BlobStore};
use crate::book::feed::FeedSource;
use crate::book::oai_pmh::BibliographicSource;
use crate::book::{FetchError, ValidationError};
use crate::cache::{CacheError, CacheWorkflow};
use crate::entity::keyword::Keyword;
use crate::entity::radio_show::RadioShow;
use crate::entity::user::User;
use crate::entity::{DocumentStore, StoreError, VersionedStore};
use crate::llm_client::{LanguageModel, LlmError};
use crate::queue::{QueueError, Task, TaskQueue};
use crate::tts::{SpeechSynthesizer, TtsError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no books were published on {0}")]
    NothingToBroadcast(NaiveDate),

    #[error("radio show {0} has no masterdata")]
    MissingMasterdata(String),

    #[error("masterdata {path} is not valid JSON: {source}")]
    CorruptMasterdata {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Tts(#[from] TtsError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("could not encode masterdata: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Whether a step did work or found it already done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    AlreadyDone,
}

/// Handles to every external system the pipeline touches.
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub feeds: Arc<dyn FeedSource>,
    pub bibliography: Arc<dyn BibliographicSource>,
    pub queue: Arc<dyn TaskQueue>,
    pub llm: Arc<dyn LanguageModel>,
    pub tts: Arc<dyn SpeechSynthesizer>,
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub feed_base_url: String,
    pub repository: String,
    pub book_max_age_days: i64,
    pub auto_migrate: bool,
}

pub struct Workflows {
    documents: Arc<dyn DocumentStore>,
    users: VersionedStore<User>,
    radio_shows: VersionedStore<RadioShow>,
    cache: CacheWorkflow,
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn TaskQueue>,
    llm: Arc<dyn LanguageModel>,
    tts: Arc<dyn SpeechSynthesizer>,
    settings: WorkflowSettings,
}

impl Workflows {
    pub fn new(collaborators: Collaborators, settings: WorkflowSettings) -> Self {
        let Collaborators {
            documents,
            blobs,
            feeds,
            bibliography,
            queue,
            llm,
            tts,
        } = collaborators;

        Self {
            users: VersionedStore::new(documents.clone(), settings.auto_migrate),
            radio_shows: VersionedStore::new(documents.clone(), settings.auto_migrate),
            cache: CacheWorkflow::new(
                blobs.clone(),
                feeds,
                bibliography,
                settings.repository.clone(),
                settings.book_max_age_days,
            ),
            documents,
            blobs,
            queue,
            llm,
            tts,
            settings,
        }
    }

    pub fn users(&self) -> &VersionedStore<User> {
        &self.users
    }

    pub fn radio_shows(&self) -> &VersionedStore<RadioShow> {
        &self.radio_shows
    }

    fn keywords_of(&self, user_id: &str) -> VersionedStore<Keyword> {
        VersionedStore::under(
            self.documents.clone(),
            &self.users.collection().doc(user_id),
            self.settings.auto_migrate,
        )
    }

    /// Runs one queued task to completion.
    pub async fn run_task(&self, task: Task) -> Result<StageOutcome, WorkflowError> {
        info!(?task, "Running task");
        match task {
            Task::LatestAll { broadcasted_at } => {
                self.latest_all(broadcasted_at).await?;
                Ok(StageOutcome::Completed)
            }
            Task::LatestWithKeywordsByUser {
                user_id,
                keyword_id,
                broadcasted_at,
            } => {
                self.latest_with_keywords_by_user(&user_id, &keyword_id, broadcasted_at)
                    .await?;
                Ok(StageOutcome::Completed)
            }
            Task::RunAgentAndTts { radio_show_id } => self.run_agent_and_tts(&radio_show_id).await,
        }
    }
}
