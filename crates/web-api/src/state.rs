use std::sync::Arc;

use refdata_data::{Repositories, UniverseSnapshotBuilder};
use refdata_services::{IngestionService, JobService, QueryService, QueueProducer};

use crate::auth::AuthService;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
    pub jobs: JobService,
    pub ingestion: IngestionService,
    pub auth: Arc<dyn AuthService>,
}

impl AppState {
    #[must_use]
    pub fn new(
        repos: &Repositories,
        queue: Arc<dyn QueueProducer>,
        auth: Arc<dyn AuthService>,
        builder: UniverseSnapshotBuilder,
    ) -> Self {
        Self {
            query: QueryService::new(repos.universe.clone(), repos.prices.clone()),
            jobs: JobService::new(repos.jobs.clone(), queue.clone()),
            ingestion: IngestionService::new(repos.universe.clone(), repos.prices.clone(), queue)
                .with_builder(builder),
            auth,
        }
    }
}
