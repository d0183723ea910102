use std::sync::atomic::{AtomicU8, Ordering};

/// How messages are currently being delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Stream feature disabled: plain publish on the profile subject
    Plain,
    /// Stream ready: stream publish on `<stream subject>.<event name>`
    Stream,
    /// Stream feature enabled but provisioning failed: plain publish on the
    /// profile subject, without the stream's delivery guarantees
    Fallback,
}

/// Publisher worker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// No active connection; the next iteration attempts failover
    Disconnected,
    /// Connected and delivering
    Connected(DeliveryMode),
    /// Worker loop has exited
    Stopped,
}

impl WorkerState {
    fn to_raw(self) -> u8 {
        match self {
            WorkerState::Disconnected => 0,
            WorkerState::Connected(DeliveryMode::Plain) => 1,
            WorkerState::Connected(DeliveryMode::Stream) => 2,
            WorkerState::Connected(DeliveryMode::Fallback) => 3,
            WorkerState::Stopped => 4,
        }
    }

    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => WorkerState::Connected(DeliveryMode::Plain),
            2 => WorkerState::Connected(DeliveryMode::Stream),
            3 => WorkerState::Connected(DeliveryMode::Fallback),
            4 => WorkerState::Stopped,
            _ => WorkerState::Disconnected,
        }
    }

    /// Delivery mode, when connected.
    pub fn delivery_mode(self) -> Option<DeliveryMode> {
        match self {
            WorkerState::Connected(mode) => Some(mode),
            _ => None,
        }
    }
}

/// Worker state published for observers. Only the worker writes it.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Disconnected.to_raw()))
    }

    pub fn load(&self) -> WorkerState {
        WorkerState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: WorkerState) {
        self.0.store(state.to_raw(), Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
