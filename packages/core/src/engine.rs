//! Page Engine
//!
//! Wires the page store, the registries and the collaborators into one
//! handle that hands out loaders and writers.
//!
//! ```no_run
//! # use pagespace_core::{EngineCollaborators, EngineConfig, PageEngine};
//! # use pagespace_core::models::{DefinedPageType, PageTypeRegistry};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let page_types = PageTypeRegistry::new().with(DefinedPageType::named("basic"))?;
//! let engine = PageEngine::open(
//!     EngineConfig::from_env()?,
//!     EngineCollaborators::new(page_types),
//! )
//! .await?;
//!
//! let homepage = engine.loader().get_homepage().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigError, EngineConfig};
use crate::db::{DatabaseError, DatabaseService, PageEvent};
use crate::models::{Actor, FieldTypeRegistry, GroupCollection, GroupDirectory, PageTypeRegistry};
use crate::services::{
    AccessAuthorisation, Authorisation, ContentLoader, ContentSearcher, PageLoader, PageWriter,
    Searcher,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open page store: {0}")]
    Database(#[from] DatabaseError),
}

/// Registries and collaborators the engine is opened with
///
/// Group directory, authorisation and searcher default to
/// [`GroupCollection`], [`AccessAuthorisation`] and [`ContentSearcher`].
#[derive(Debug)]
pub struct EngineCollaborators {
    page_types: PageTypeRegistry,
    field_types: FieldTypeRegistry,
    groups: Arc<dyn GroupDirectory>,
    authorisation: Arc<dyn Authorisation>,
    searcher: Option<Arc<dyn Searcher>>,
}

impl EngineCollaborators {
    pub fn new(page_types: PageTypeRegistry) -> Self {
        Self {
            page_types,
            field_types: FieldTypeRegistry::new(),
            groups: Arc::new(GroupCollection::new()),
            authorisation: Arc::new(AccessAuthorisation::new()),
            searcher: None,
        }
    }

    pub fn with_field_types(mut self, field_types: FieldTypeRegistry) -> Self {
        self.field_types = field_types;
        self
    }

    pub fn with_groups(mut self, groups: Arc<dyn GroupDirectory>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_authorisation(mut self, authorisation: Arc<dyn Authorisation>) -> Self {
        self.authorisation = authorisation;
        self
    }

    pub fn with_searcher(mut self, searcher: Arc<dyn Searcher>) -> Self {
        self.searcher = Some(searcher);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PageEngine {
    config: EngineConfig,
    db: Arc<DatabaseService>,
    loader: PageLoader,
    content_loader: ContentLoader,
    events: broadcast::Sender<PageEvent>,
}

impl PageEngine {
    /// Validate `config`, open the page store and build the services
    pub async fn open(
        config: EngineConfig,
        collaborators: EngineCollaborators,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let db = Arc::new(
            DatabaseService::with_busy_timeout(config.database_path.clone(), config.busy_timeout_ms)
                .await?,
        );

        let searcher = collaborators
            .searcher
            .unwrap_or_else(|| Arc::new(ContentSearcher::new(Arc::clone(&db))));

        let loader = PageLoader::new(
            Arc::clone(&db),
            Arc::new(collaborators.page_types),
            collaborators.groups,
            collaborators.authorisation,
            searcher,
        )
        .include_unpublished(config.include_unpublished)
        .include_unviewable(config.include_unviewable)
        .order_by(config.default_order.clone())
        .with_search_min_term_length(config.search_min_term_length);

        let content_loader = ContentLoader::new(Arc::clone(&db), Arc::new(collaborators.field_types));
        let (events, _) = broadcast::channel(config.event_channel_capacity);

        tracing::info!(
            path = %config.database_path.display(),
            page_types = loader.page_types().len(),
            "page engine ready"
        );

        Ok(Self {
            config,
            db,
            loader,
            content_loader,
            events,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn db(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    /// Loader with the configured defaults, acting as a guest
    pub fn loader(&self) -> &PageLoader {
        &self.loader
    }

    pub fn loader_for(&self, actor: Actor) -> PageLoader {
        self.loader.clone().for_actor(actor)
    }

    pub fn content_loader(&self) -> &ContentLoader {
        &self.content_loader
    }

    /// Writer acting as a guest
    pub fn writer(&self) -> PageWriter {
        PageWriter::new(Arc::clone(&self.db), self.loader.clone(), self.events.clone())
    }

    pub fn writer_for(&self, actor: Actor) -> PageWriter {
        self.writer().for_actor(actor)
    }

    pub fn subscribe_to_events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}
