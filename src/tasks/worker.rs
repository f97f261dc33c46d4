//! Hand-off from the rendering context to the worker that performs the
//! composite and encode. The frame callback enqueues a closure; the worker
//! runs it to completion.

use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::debug;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Executes tasks away from the rendering context.
pub trait TaskRunner: Send + Sync {
    fn execute(&self, task: Task);
}

enum WorkerMsg {
    Run(Task),
    Quit,
}

/// A single named worker thread fed by a channel.
pub struct Worker {
    tx: Sender<WorkerMsg>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(name: &str) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<WorkerMsg>();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run_loop(&rx))
            .expect("spawning worker thread");
        Self {
            tx,
            handle: Some(handle),
        }
    }
}

fn run_loop(rx: &Receiver<WorkerMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::Run(task) => task(),
            WorkerMsg::Quit => break,
        }
    }
    debug!("worker loop ended");
}

impl TaskRunner for Worker {
    fn execute(&self, task: Task) {
        // A closed channel means the worker is gone; the task is dropped
        // without running.
        let _ = self.tx.send(WorkerMsg::Run(task));
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerMsg::Quit);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Runs tasks on the calling thread. Deterministic, for tests and
/// single-threaded embedders.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineRunner;

impl TaskRunner for InlineRunner {
    fn execute(&self, task: Task) {
        task();
    }
}
