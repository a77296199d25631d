//! The slice of the host pipeline an output plugin talks to: records and the runner that delivers
//! them.

use tokio::sync::mpsc;

/// One unit of log data handed to an output plugin.
///
/// Plugins copy what they need out of [`Record::payload`] and then call [`Record::recycle`] so the
/// host can reuse the record. Nothing may borrow from the record after that.
pub trait Record: Send + 'static {
    fn payload(&self) -> &[u8];

    fn recycle(self);
}

/// Stock record type carrying an owned payload.
///
/// A pooled pack is sent back to its pool on recycle with the payload cleared; an unpooled pack
/// is dropped.
#[derive(Debug)]
pub struct PipelinePack {
    payload: Vec<u8>,
    pool: Option<mpsc::UnboundedSender<PipelinePack>>,
}

impl PipelinePack {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            pool: None,
        }
    }

    pub fn pooled(payload: impl Into<Vec<u8>>, pool: mpsc::UnboundedSender<PipelinePack>) -> Self {
        Self {
            payload: payload.into(),
            pool: Some(pool),
        }
    }

    /// Replaces the payload, keeping the existing allocation.
    pub fn set_payload(&mut self, payload: &[u8]) {
        self.payload.clear();
        self.payload.extend_from_slice(payload);
    }
}

impl Record for PipelinePack {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn recycle(mut self) {
        self.payload.clear();
        if let Some(pool) = self.pool.clone() {
            // A closed pool just drops the pack.
            let _ = pool.send(self);
        }
    }
}

/// Delivery side of the host for a single output plugin instance.
#[derive(Debug)]
pub struct OutputRunner<R> {
    name: String,
    in_chan: mpsc::Receiver<R>,
}

impl<R: Record> OutputRunner<R> {
    pub fn new(name: impl Into<String>, in_chan: mpsc::Receiver<R>) -> Self {
        Self {
            name: name.into(),
            in_chan,
        }
    }

    /// Plugin name used to tag log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records arrive here in host order; `recv` yields `None` once every sender is gone.
    pub fn in_chan(&mut self) -> &mut mpsc::Receiver<R> {
        &mut self.in_chan
    }
}

/// Creates a bounded record channel and the runner reading from it.
pub fn output_channel<R: Record>(
    name: impl Into<String>,
    capacity: usize,
) -> (mpsc::Sender<R>, OutputRunner<R>) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, OutputRunner::new(name, rx))
}
