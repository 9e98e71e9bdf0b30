//! Worker pool supervisor

use crate::{CourierError, RequestHandler, Result, WorkerAgent, WorkerConfig};
use courier_transport::Context;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Owns a set of running worker agents.
///
/// Dropping the pool aborts any worker still running.
pub struct WorkerPool {
    workers: Vec<WorkerAgent>,
    tasks: JoinSet<(usize, Result<()>)>,
}

impl WorkerPool {
    /// Launch `size` workers against `endpoint`
    pub fn spawn(
        context: &Context,
        config: &WorkerConfig,
        handler: Arc<dyn RequestHandler>,
        endpoint: &str,
        size: usize,
    ) -> Self {
        let mut tasks = JoinSet::new();
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let worker = WorkerAgent::with_handler(
                context,
                config.clone(),
                format!("worker-{}", index + 1),
                Arc::clone(&handler),
            );
            let runner = worker.clone();
            let endpoint = endpoint.to_string();
            tasks.spawn(async move { (index, runner.run(&endpoint).await) });
            workers.push(worker);
        }

        info!("Launched {} worker(s) against {}", size, endpoint);
        Self { workers, tasks }
    }

    /// Number of workers launched
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Check if the pool was launched empty
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Workers in launch order
    pub fn workers(&self) -> &[WorkerAgent] {
        &self.workers
    }

    /// Number of workers still running
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for the next worker to exit, logging how it ended.
    ///
    /// Returns `None` once every worker has exited.
    pub async fn next_exit(&mut self) -> Option<Result<()>> {
        let joined = self.tasks.join_next().await?;
        let outcome = match joined {
            Ok((index, result)) => {
                let name = self.workers[index].name();
                match &result {
                    Ok(()) => info!("{} exited", name),
                    Err(e) => error!("{} failed: {}", name, e),
                }
                result
            }
            Err(e) => {
                error!("Worker task panicked or was cancelled: {}", e);
                Err(CourierError::from(e))
            }
        };
        Some(outcome)
    }

    /// Wait until no worker is left running, logging each exit
    pub async fn exhausted(&mut self) {
        while self.next_exit().await.is_some() {}
    }

    /// Wait for every worker, returning the first failure
    pub async fn join_all(mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(result) = self.next_exit().await {
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Abort every worker without waiting
    pub fn abort(&mut self) {
        self.tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EchoHandler;
    use std::time::Duration;

    #[tokio::test]
    async fn test_pool_size_and_names() {
        let ctx = Context::new();
        ctx.terminate();
        let pool = WorkerPool::spawn(&ctx, &WorkerConfig::default(), Arc::new(EchoHandler), "tcp://127.0.0.1:1", 3);

        assert_eq!(pool.len(), 3);
        let names: Vec<&str> = pool.workers().iter().map(|w| w.name()).collect();
        assert_eq!(names, vec!["worker-1", "worker-2", "worker-3"]);

        // Terminated context: every worker exits cleanly
        tokio::time::timeout(Duration::from_secs(5), pool.join_all())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_all_reports_failure() {
        let ctx = Context::new();
        let pool = WorkerPool::spawn(&ctx, &WorkerConfig::default(), Arc::new(EchoHandler), "tcp://127.0.0.1", 2);

        let result = tokio::time::timeout(Duration::from_secs(5), pool.join_all()).await.unwrap();
        assert!(matches!(result, Err(CourierError::Transport(_))));
    }
}
