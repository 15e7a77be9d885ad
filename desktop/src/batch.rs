use std::{
    collections::{HashSet, VecDeque},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread::JoinHandle,
    time::Duration,
};

use log::{debug, info, warn};
use oledpack_core::{
    Error, FrameRgba, MonochromeOptions, PackedFrame, PackingOptions, mono::convert_frame, pack,
};

/// Frame count above which the CLIs hand work to a [`BatchWorker`].
pub const BATCH_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    Pack(Error),
    DuplicateId(u64),
    Terminated,
}

impl From<Error> for BatchError {
    fn from(err: Error) -> Self {
        BatchError::Pack(err)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Pack(err) => write!(f, "{}", err),
            BatchError::DuplicateId(id) => write!(f, "batch {} is already in flight", id),
            BatchError::Terminated => f.write_str("batch worker terminated"),
        }
    }
}

impl std::error::Error for BatchError {}

pub struct BatchRequest {
    pub id: u64,
    pub frames: Vec<FrameRgba>,
    pub mono: MonochromeOptions,
    pub packing: PackingOptions,
}

#[derive(Debug)]
pub enum BatchEvent {
    /// Advisory, may be dropped
    Progress { id: u64, done: usize, total: usize },
    Finished {
        id: u64,
        result: Result<Vec<PackedFrame>, BatchError>,
    },
}

/// Owned handle to a worker thread running convert + pack.
///
/// A request id stays in flight until its `Finished` event has been received.
pub struct BatchWorker {
    requests: Option<Sender<BatchRequest>>,
    events: Receiver<BatchEvent>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    in_flight: HashSet<u64>,
    rejected: VecDeque<BatchEvent>,
}

impl BatchWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let worker = std::thread::Builder::new()
            .name("oledpack-batch".into())
            .spawn(move || run(request_rx, event_tx, flag))?;
        debug!("Batch worker started");
        Ok(Self {
            requests: Some(request_tx),
            events: event_rx,
            cancelled,
            worker: Some(worker),
            in_flight: HashSet::new(),
            rejected: VecDeque::new(),
        })
    }

    pub fn submit(&mut self, request: BatchRequest) -> Result<(), BatchError> {
        let Some(requests) = &self.requests else {
            return Err(BatchError::Terminated);
        };
        let id = request.id;
        if !self.in_flight.insert(id) {
            return Err(BatchError::DuplicateId(id));
        }
        if requests.send(request).is_err() {
            self.in_flight.remove(&id);
            return Err(BatchError::Terminated);
        }
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Blocks for the next event. `None` once nothing is in flight.
    pub fn recv(&mut self) -> Option<BatchEvent> {
        if let Some(event) = self.rejected.pop_front() {
            return Some(event);
        }
        if self.in_flight.is_empty() {
            return None;
        }
        let event = self.events.recv().ok()?;
        Some(self.deliver(event))
    }

    /// Like [`recv`](Self::recv), but gives up after `timeout`. `None` then
    /// means either nothing is in flight or no event arrived in time.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<BatchEvent> {
        if let Some(event) = self.rejected.pop_front() {
            return Some(event);
        }
        if self.in_flight.is_empty() {
            return None;
        }
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(self.deliver(event)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn deliver(&mut self, event: BatchEvent) -> BatchEvent {
        if let BatchEvent::Finished { id, .. } = &event {
            self.in_flight.remove(id);
        }
        event
    }

    /// Tears the worker down. Every request still in flight is answered with
    /// [`BatchError::Terminated`]; finished but unreceived results are dropped.
    pub fn terminate(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.cancelled.store(true, Ordering::Release);
        self.requests = None;
        if worker.join().is_err() {
            warn!("Batch worker panicked");
        }
        while self.events.try_recv().is_ok() {}

        let mut ids: Vec<u64> = self.in_flight.drain().collect();
        ids.sort_unstable();
        info!("Batch worker terminated, rejecting {} requests", ids.len());
        self.rejected
            .extend(ids.into_iter().map(|id| BatchEvent::Finished {
                id,
                result: Err(BatchError::Terminated),
            }));
    }
}

impl Drop for BatchWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run(requests: Receiver<BatchRequest>, events: Sender<BatchEvent>, cancelled: Arc<AtomicBool>) {
    while let Ok(request) = requests.recv() {
        let Some(result) = process(&request, &events, &cancelled) else {
            break;
        };
        debug!("Batch {} finished", request.id);
        if events
            .send(BatchEvent::Finished {
                id: request.id,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}

/// `None` when cancelled part way through.
fn process(
    request: &BatchRequest,
    events: &Sender<BatchEvent>,
    cancelled: &AtomicBool,
) -> Option<Result<Vec<PackedFrame>, BatchError>> {
    let total = request.frames.len();
    let mut mono = Vec::with_capacity(total);
    for (index, frame) in request.frames.iter().enumerate() {
        if cancelled.load(Ordering::Acquire) {
            return None;
        }
        mono.push(convert_frame(frame, &request.mono));
        let _ = events.send(BatchEvent::Progress {
            id: request.id,
            done: index + 1,
            total,
        });
    }
    if cancelled.load(Ordering::Acquire) {
        return None;
    }
    Some(pack(&mono, &request.packing).map_err(BatchError::from))
}

/// Converts and packs `frames`, off-thread when there are more than [`BATCH_THRESHOLD`].
pub fn convert_and_pack(
    frames: Vec<FrameRgba>,
    mono: &MonochromeOptions,
    packing: &PackingOptions,
) -> Result<Vec<PackedFrame>, BatchError> {
    if frames.len() <= BATCH_THRESHOLD {
        let converted = oledpack_core::convert(&frames, mono);
        return Ok(pack(&converted, packing)?);
    }

    let mut worker = BatchWorker::spawn().map_err(|err| {
        warn!("Could not start batch worker: {}", err);
        BatchError::Terminated
    })?;
    worker.submit(BatchRequest {
        id: 0,
        frames,
        mono: *mono,
        packing: *packing,
    })?;
    while let Some(event) = worker.recv() {
        match event {
            BatchEvent::Progress { done, total, .. } => {
                if done % 50 == 0 || done == total {
                    info!("Converted {}/{} frames", done, total);
                }
            }
            BatchEvent::Finished { result, .. } => return result,
        }
    }
    Err(BatchError::Terminated)
}
