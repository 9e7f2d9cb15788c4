use async_trait::async_trait;
use futures::future::join_all;
use num_format::{Locale, ToFormattedString};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// One unit of work run by every worker in the pool
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    /// Label used in logs and the run report
    fn role(&self) -> &'static str;

    /// Run the worker to completion; never panics on transport errors
    async fn run(&self, worker_id: usize) -> WorkerResult;
}

/// Outcome of a single worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    pub worker_id: usize,

    /// Messages handled (consumer) or sent (producer)
    pub handled: u64,

    /// The error that ended the worker early, if any
    pub error: Option<String>,

    pub elapsed: Duration,
}

impl WorkerResult {
    pub fn completed(worker_id: usize, handled: u64, elapsed: Duration) -> Self {
        Self {
            worker_id,
            handled,
            error: None,
            elapsed,
        }
    }

    pub fn failed(worker_id: usize, handled: u64, error: impl ToString, elapsed: Duration) -> Self {
        Self {
            worker_id,
            handled,
            error: Some(error.to_string()),
            elapsed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs `num_threads` independent copies of a worker
pub struct WorkerPool {
    num_threads: u32,
}

impl WorkerPool {
    pub fn new(num_threads: u32) -> Self {
        Self { num_threads }
    }

    /// Run every worker and wait for all of them
    ///
    /// A single worker runs on the caller's task. Otherwise each worker gets
    /// its own tokio task; a task that panics is reported as a failed worker.
    pub async fn run(&self, worker: Arc<dyn Worker>) -> RunReport {
        let role = worker.role();
        let start = Instant::now();
        info!(role, workers = self.num_threads, "starting workers");

        let results = if self.num_threads <= 1 {
            vec![worker.run(0).await]
        } else {
            let tasks = (0..self.num_threads as usize).map(|worker_id| {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move { worker.run(worker_id).await })
            });

            join_all(tasks)
                .await
                .into_iter()
                .enumerate()
                .map(|(worker_id, joined)| {
                    joined.unwrap_or_else(|err| {
                        error!(worker = worker_id, error = %err, "worker task failed");
                        WorkerResult::failed(worker_id, 0, err, start.elapsed())
                    })
                })
                .collect()
        };

        let report = RunReport {
            role,
            results,
            elapsed: start.elapsed(),
        };
        info!(
            role,
            handled = report.total_handled(),
            failed = report.failed(),
            "all workers finished"
        );
        report
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub role: &'static str,
    pub results: Vec<WorkerResult>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn total_handled(&self) -> u64 {
        self.results.iter().map(|result| result.handled).sum()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|result| !result.is_ok()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Messages per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_handled() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = format!(
            "
{} Results
---------------------
Number of Workers: {}
Messages Handled: {}
Failed Workers: {}",
            capitalize(self.role),
            self.results.len().to_formatted_string(&Locale::en),
            self.total_handled().to_formatted_string(&Locale::en),
            self.failed().to_formatted_string(&Locale::en),
        );

        let header = format!(
            "| {: <8} | {: <12} | {: <14} | {: <30} |",
            "Worker", "Handled", "Duration", "Error"
        );

        writeln!(f, "{summary}\n\n{header}")?;
        for result in &self.results {
            writeln!(
                f,
                "| {: <8} | {: <12} | {: <14} | {: <30} |",
                result.worker_id,
                result.handled.to_formatted_string(&Locale::en),
                format!("{:.4} Secs", result.elapsed.as_secs_f64()),
                result.error.as_deref().unwrap_or("-"),
            )?;
        }
        writeln!(
            f,
            "\nTotal: {:.4} Secs, {:.2} msg/s",
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Worker for Counting {
        fn role(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, worker_id: usize) -> WorkerResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            WorkerResult::completed(worker_id, 10, Duration::ZERO)
        }
    }

    struct Panicking;

    #[async_trait]
    impl Worker for Panicking {
        fn role(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self, worker_id: usize) -> WorkerResult {
            if worker_id == 1 {
                panic!("worker {worker_id} blew up");
            }
            WorkerResult::completed(worker_id, 1, Duration::ZERO)
        }
    }

    #[tokio::test]
    async fn test_single_worker_runs_inline() {
        let worker = Arc::new(Counting {
            runs: AtomicUsize::new(0),
        });
        let report = WorkerPool::new(1).run(worker.clone()).await;
        assert_eq!(worker.runs.load(Ordering::SeqCst), 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.total_handled(), 10);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_runs_every_worker() {
        let worker = Arc::new(Counting {
            runs: AtomicUsize::new(0),
        });
        let report = WorkerPool::new(4).run(worker.clone()).await;
        assert_eq!(worker.runs.load(Ordering::SeqCst), 4);
        let ids: Vec<usize> = report.results.iter().map(|r| r.worker_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(report.total_handled(), 40);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported_failed() {
        let report = WorkerPool::new(3).run(Arc::new(Panicking)).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 1);
        assert!(!report.results[1].is_ok());
        assert_eq!(report.total_handled(), 2);
    }

    #[test]
    fn test_report_display() {
        let report = RunReport {
            role: "consumer",
            results: vec![
                WorkerResult::completed(0, 1500, Duration::from_millis(20)),
                WorkerResult::failed(1, 3, "connection is closed", Duration::from_millis(5)),
            ],
            elapsed: Duration::from_secs(1),
        };
        let text = report.to_string();
        assert!(text.contains("Consumer Results"));
        assert!(text.contains("Messages Handled: 1,503"));
        assert!(text.contains("Failed Workers: 1"));
        assert!(text.contains("connection is closed"));
    }
}
