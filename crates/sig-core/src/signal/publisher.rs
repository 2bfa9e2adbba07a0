use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use anyhow::Result;

use super::Signal;

/// Transport for outbound signals.
pub trait SignalPublisher: Send + Sync {
    fn publish(&self, signal: &Signal) -> Result<()>;
}

impl<T: SignalPublisher + ?Sized> SignalPublisher for std::sync::Arc<T> {
    fn publish(&self, signal: &Signal) -> Result<()> {
        (**self).publish(signal)
    }
}

/// Appends signals as JSON Lines to a file.
pub struct JsonlSignalPublisher {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSignalPublisher {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalPublisher for JsonlSignalPublisher {
    fn publish(&self, signal: &Signal) -> Result<()> {
        let json = serde_json::to_string(signal)?;
        let mut w = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        w.write_all(json.as_bytes())?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

/// Delivers every signal to all publishers, even after one fails.
/// Returns the first error encountered.
pub struct FanOutPublisher {
    publishers: Vec<Box<dyn SignalPublisher>>,
}

impl FanOutPublisher {
    pub fn new(publishers: Vec<Box<dyn SignalPublisher>>) -> Self {
        Self { publishers }
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl SignalPublisher for FanOutPublisher {
    fn publish(&self, signal: &Signal) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        for p in &self.publishers {
            if let Err(e) = p.publish(signal) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Keeps published signals in memory. Can be switched into a failing mode
/// to simulate an unavailable transport.
#[derive(Default)]
pub struct MemoryPublisher {
    signals: Mutex<Vec<Signal>>,
    failing: AtomicBool,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SignalPublisher for MemoryPublisher {
    fn publish(&self, signal: &Signal) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("publisher unavailable");
        }
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal.clone());
        Ok(())
    }
}
