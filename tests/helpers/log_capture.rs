#![allow(dead_code)]
//! Captures formatted tracing output in memory.
//!
//! `traced_test` only sees the global/thread default subscriber, not the
//! `Dispatch` a `NotificationManager` is built with, so tests that inject one
//! read its output from here.

use std::io;
use std::sync::{Arc, Mutex};
use tracing::Dispatch;

/// An in-memory log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A dispatcher writing every event at DEBUG and above into the returned buffer.
pub fn capture_dispatch() -> (Dispatch, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (Dispatch::new(subscriber), buffer)
}
