#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::Notify;

use relaytv_core::relay::EncoderStdout;
use relaytv_core::{EncoderChild, OutputMode, ProcessExit, ProcessSpawner};

/// Observable state of one fake encoder.
#[derive(Default)]
pub struct ChildProbe {
    pub pid: u32,
    pub args: Vec<String>,
    terminations: AtomicUsize,
    exit: Mutex<Option<ProcessExit>>,
    exited: Notify,
    /// Test-side end of the encoder's stdout pipe.
    pub stdout_writer: Mutex<Option<DuplexStream>>,
}

impl ChildProbe {
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exit.lock().unwrap().is_some()
    }

    /// Simulates the process exiting on its own.
    pub fn exit_with(&self, code: i32) {
        self.finish(ProcessExit { code: Some(code) });
    }

    fn finish(&self, exit: ProcessExit) {
        let mut guard = self.exit.lock().unwrap();
        if guard.is_none() {
            *guard = Some(exit);
        }
        drop(guard);
        self.exited.notify_waiters();
    }

    pub fn take_writer(&self) -> DuplexStream {
        self.stdout_writer
            .lock()
            .unwrap()
            .take()
            .expect("child was spawned without a stdout pipe")
    }
}

pub struct MockChild {
    probe: Arc<ChildProbe>,
    stdout: Option<EncoderStdout>,
}

#[async_trait]
impl EncoderChild for MockChild {
    fn id(&self) -> Option<u32> {
        Some(self.probe.pid)
    }

    fn take_stdout(&mut self) -> Option<EncoderStdout> {
        self.stdout.take()
    }

    fn terminate(&mut self) -> io::Result<()> {
        if self.probe.has_exited() {
            return Ok(());
        }
        self.probe.terminations.fetch_add(1, Ordering::SeqCst);
        self.probe.finish(ProcessExit { code: None });
        Ok(())
    }

    fn try_wait(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(*self.probe.exit.lock().unwrap())
    }

    async fn wait(&mut self) -> io::Result<ProcessExit> {
        loop {
            let notified = self.probe.exited.notified();
            let exit = *self.probe.exit.lock().unwrap();
            if let Some(exit) = exit {
                return Ok(exit);
            }
            notified.await;
        }
    }
}

type SpawnHook = Box<dyn Fn() + Send + Sync>;

/// Hands out [`MockChild`]s and keeps their probes for inspection.
#[derive(Default)]
pub struct MockSpawner {
    next_pid: AtomicU32,
    fail: AtomicBool,
    probes: Mutex<Vec<Arc<ChildProbe>>>,
    on_spawn: Mutex<Option<SpawnHook>>,
}

impl MockSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(1000),
            ..Default::default()
        })
    }

    pub fn fail_spawns(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Runs `hook` at the start of every spawn call.
    pub fn on_spawn(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_spawn.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn probes(&self) -> Vec<Arc<ChildProbe>> {
        self.probes.lock().unwrap().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.probes.lock().unwrap().len()
    }

    pub fn probe(&self, index: usize) -> Arc<ChildProbe> {
        Arc::clone(&self.probes.lock().unwrap()[index])
    }
}

impl ProcessSpawner for MockSpawner {
    fn spawn(&self, args: &[String], output: OutputMode) -> io::Result<Box<dyn EncoderChild>> {
        if let Some(hook) = self.on_spawn.lock().unwrap().as_ref() {
            hook();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "ffmpeg not found"));
        }
        let (stdout, writer) = match output {
            OutputMode::Piped => {
                let (reader, writer) = tokio::io::duplex(64 * 1024);
                (Some(Box::new(reader) as EncoderStdout), Some(writer))
            }
            OutputMode::Discard => (None, None),
        };
        let probe = Arc::new(ChildProbe {
            pid: self.next_pid.fetch_add(1, Ordering::SeqCst),
            args: args.to_vec(),
            stdout_writer: Mutex::new(writer),
            ..Default::default()
        });
        self.probes.lock().unwrap().push(Arc::clone(&probe));
        Ok(Box::new(MockChild { probe, stdout }))
    }

    fn program(&self) -> &Path {
        Path::new("ffmpeg")
    }
}

pub fn temp_store(dir: &Path) -> (relaytv_core::SqliteDvrStore, PathBuf) {
    let path = dir.join("dvr.sqlite");
    let store = relaytv_core::SqliteDvrStore::builder()
        .path(&path)
        .create_if_missing(true)
        .build()
        .expect("create store");
    store.initialize().expect("initialize store");
    (store, path)
}
