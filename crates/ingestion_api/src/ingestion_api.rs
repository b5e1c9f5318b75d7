use crate::domain::ReadingService;
use crate::http::router;
use common::http::run_http_server;
use meterflow_runner::ProcessFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Ingestion gateway module: the reading service behind its HTTP router
pub struct IngestionApi {
    service: Arc<ReadingService>,
    addr: String,
}

impl IngestionApi {
    pub fn new(service: Arc<ReadingService>, addr: impl Into<String>) -> Self {
        debug!("Initializing ingestion API module");
        Self {
            service,
            addr: addr.into(),
        }
    }

    pub fn into_runner_process(self) -> impl FnOnce(CancellationToken) -> ProcessFuture + Send {
        move |ctx: CancellationToken| -> ProcessFuture {
            Box::pin(async move { run_http_server(&self.addr, router(self.service), ctx).await })
        }
    }
}
