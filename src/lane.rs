//! Single-worker execution lane for blocking OS calls.
//! Jobs run FIFO on one dedicated thread, never concurrently; callers await the result.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::{AuthError, AuthResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct BlockingLane {
    name: String,
    tx: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl BlockingLane {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let lane_name = name.to_string();
        let worker = thread::Builder::new().name(lane_name.clone()).spawn(move || {
            while let Ok(job) = rx.recv() {
                // A panicking job drops its reply sender; the caller sees lane_job_failed.
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    error!(target: "winauth", "lane {}: job panicked", lane_name);
                }
            }
            debug!(target: "winauth", "lane {}: worker exiting", lane_name);
        })?;
        Ok(Self { name: name.to_string(), tx: Some(tx), worker: Some(worker) })
    }

    pub fn name(&self) -> &str { &self.name }

    /// Queue `f` on the worker and wait for its output.
    pub async fn run<F, T>(&self, f: F) -> AuthResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // Receiver may be gone if the caller was cancelled.
            let _ = reply_tx.send(f());
        });
        let Some(tx) = self.tx.as_ref() else {
            return Err(AuthError::internal("lane_closed".to_string(), format!("lane {} is shut down", self.name)));
        };
        tx.send(job)
            .map_err(|_| AuthError::internal("lane_closed".to_string(), format!("lane {} worker is gone", self.name)))?;
        reply_rx
            .await
            .map_err(|_| AuthError::internal("lane_job_failed".to_string(), format!("lane {} job did not complete", self.name)))
    }
}

impl Drop for BlockingLane {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            // Joining from the worker itself would deadlock.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}
