#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::Utf8PathBuf;
use shelvediff_core::hosts::{
    CompareRequest, CompareViewer, Dispatcher, HostError, HostResult, ProcessLauncher,
    ToolProcess,
};
use shelvediff_core::SessionOptions;
use tempfile::TempDir;

/// Argument template separating expanded values with `|` so tests can split them.
pub const PIPE_TEMPLATE: &str = "%1|%2|%6|%7";

/// What a fake launcher saw when a tool was started.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub command: String,
    pub arguments: String,
    /// Content of the left and right files at launch time; `None` if missing.
    pub contents: Vec<Option<String>>,
}

impl LaunchRecord {
    pub fn parts(&self) -> Vec<&str> {
        self.arguments.split('|').collect()
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub launches: Mutex<Vec<LaunchRecord>>,
    pub fail: bool,
    pub exited: Arc<AtomicBool>,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn single(&self) -> LaunchRecord {
        let launches = self.launches.lock().expect("launches lock");
        assert_eq!(launches.len(), 1, "expected exactly one launch");
        launches[0].clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, command: &str, arguments: &str) -> HostResult<Box<dyn ToolProcess>> {
        if self.fail {
            return Err(HostError::message(format!("{command}: not found")));
        }
        let contents = arguments
            .split('|')
            .take(2)
            .map(|path| fs::read_to_string(path).ok())
            .collect();
        self.launches
            .lock()
            .expect("launches lock")
            .push(LaunchRecord {
                command: command.to_owned(),
                arguments: arguments.to_owned(),
                contents,
            });
        Ok(Box::new(FakeProcess {
            exited: Arc::clone(&self.exited),
        }))
    }
}

/// Process that reports an exit as soon as it is waited on.
pub struct FakeProcess {
    exited: Arc<AtomicBool>,
}

impl ToolProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn wait_for_exit(&mut self, _timeout: Duration) -> HostResult<bool> {
        self.exited.store(true, Ordering::SeqCst);
        Ok(true)
    }
}

#[derive(Default)]
pub struct RecordingViewer {
    pub requests: Mutex<Vec<(CompareRequest, bool, bool)>>,
    pub fail: bool,
}

impl CompareViewer for RecordingViewer {
    fn open_compare(&self, request: &CompareRequest) -> HostResult<()> {
        if self.fail {
            return Err(HostError::message("viewer unavailable"));
        }
        let left_exists = fs::metadata(&request.left_path).is_ok();
        let right_exists = fs::metadata(&request.right_path).is_ok();
        self.requests
            .lock()
            .expect("requests lock")
            .push((request.clone(), left_exists, right_exists));
        Ok(())
    }
}

/// Holds jobs until the test runs them.
#[derive(Default)]
pub struct QueueDispatcher {
    jobs: Mutex<VecDeque<Box<dyn FnOnce() + Send + 'static>>>,
}

impl QueueDispatcher {
    pub fn pending(&self) -> usize {
        self.jobs.lock().expect("jobs lock").len()
    }

    pub fn run_all(&self) {
        loop {
            let job = self.jobs.lock().expect("jobs lock").pop_front();
            match job {
                Some(job) => job(),
                None => break,
            }
        }
    }
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        self.jobs.lock().expect("jobs lock").push_back(job);
    }
}

/// Dispatcher that loses every job.
pub struct DroppingDispatcher;

impl Dispatcher for DroppingDispatcher {
    fn dispatch(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        drop(job);
    }
}

pub fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
}

pub fn options_in(dir: &TempDir) -> SessionOptions {
    SessionOptions {
        temp_dir: Some(utf8_dir(dir)),
        ..SessionOptions::default()
    }
}

pub fn file_names(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir.path())
        .expect("read temp dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
