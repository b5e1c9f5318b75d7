use crate::domain::StreamProcessor;
use crate::http::{router, QueryState};
use common::http::run_http_server;
use meterflow_runner::{AppProcess, ProcessFuture};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Processing module: the stream processor loop and the query gateway in front of the index
pub struct ProcessingService {
    processor: Arc<StreamProcessor>,
    query_state: QueryState,
    addr: String,
}

impl ProcessingService {
    pub fn new(processor: StreamProcessor, query_state: QueryState, addr: impl Into<String>) -> Self {
        debug!(consumer = %processor.consumer(), "Initializing processing service module");
        Self {
            processor: Arc::new(processor),
            query_state,
            addr: addr.into(),
        }
    }

    /// Named runner processes: the query API and the stream processor
    pub fn into_runner_processes(self) -> Vec<(&'static str, AppProcess)> {
        let addr = self.addr;
        let state = self.query_state;
        let query_api: AppProcess = Box::new(move |ctx: CancellationToken| -> ProcessFuture {
            Box::pin(async move { run_http_server(&addr, router(state), ctx).await })
        });

        let processor = self.processor;
        let stream_processor: AppProcess = Box::new(move |ctx: CancellationToken| -> ProcessFuture {
            Box::pin(async move { processor.run(ctx).await })
        });

        vec![("query_api", query_api), ("stream_processor", stream_processor)]
    }
}
