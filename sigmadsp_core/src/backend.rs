//! The DSP worker: a single OS thread that owns the [`Dsp`] and therefore
//! the bus. Everything else talks to it through a cloneable [`DspHandle`].
//!
//! Commands are executed strictly in arrival order, one at a time. Replies
//! travel back on per-command oneshot channels; a requester that went away
//! simply never reads its reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::config::config as global_config;
use crate::dsp::{Dsp, ParameterFormat, ParameterValue, SafetyHashCell};
use crate::error::SigmaDspError;
use crate::generator::ChipFamily;
use crate::request::{ReadRequest, ReadResponse, SafeloadRequest, SigmaRequest, WriteRequest};

type Reply<T> = oneshot::Sender<Result<T, SigmaDspError>>;

pub enum DspCommand {
    Write(WriteRequest),
    Safeload(SafeloadRequest),
    Read(ReadRequest, oneshot::Sender<ReadResponse>),
    SetParameter {
        address: u16,
        value: ParameterValue,
        reply: Reply<()>,
    },
    GetParameter {
        address: u16,
        format: ParameterFormat,
        reply: Reply<ParameterValue>,
    },
    SetVolume {
        volume_db: f64,
        address: u16,
        relative: bool,
        reply: Reply<f64>,
    },
    SoftReset(oneshot::Sender<()>),
    HardReset {
        hold: Duration,
        reply: Reply<()>,
    },
    CheckSafetyHash {
        cell: Option<SafetyHashCell>,
        reply: Reply<bool>,
    },
}

pub struct DspWorker;

impl DspWorker {
    /// Move `dsp` onto a dedicated thread fed by a queue of `capacity`
    /// commands. The thread exits once every handle is dropped.
    pub fn spawn(
        dsp: Box<dyn Dsp>,
        capacity: usize,
    ) -> Result<(DspHandle, JoinHandle<()>), SigmaDspError> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let family = dsp.chip_family();
        let join = thread::Builder::new()
            .name("sigmadsp-worker".to_string())
            .spawn(move || run(dsp, rx))?;
        Ok((DspHandle { tx, family }, join))
    }

    /// Like [`spawn`](Self::spawn) with the queue bound from the runtime config.
    pub fn spawn_default(dsp: Box<dyn Dsp>) -> Result<(DspHandle, JoinHandle<()>), SigmaDspError> {
        Self::spawn(dsp, global_config().channel_capacity)
    }
}

fn run(mut dsp: Box<dyn Dsp>, mut rx: mpsc::Receiver<DspCommand>) {
    log::debug!("DSP worker started for {}", dsp.chip_family());
    while let Some(command) = rx.blocking_recv() {
        execute(dsp.as_mut(), command);
    }
    log::debug!("DSP worker stopped");
}

fn execute(dsp: &mut dyn Dsp, command: DspCommand) {
    match command {
        DspCommand::Write(request) => dsp.write(request.address, &request.data),
        DspCommand::Safeload(request) => {
            if let Err(e) = dsp.safeload(request.address, &request.data) {
                log::error!("Safeload to 0x{:04X} failed: {e}", request.address);
            }
        }
        DspCommand::Read(request, reply) => {
            let data = dsp
                .read(request.address, request.length)
                .unwrap_or_else(|e| {
                    log::error!(
                        "Read of {} bytes from 0x{:04X} failed, answering zeros: {e}",
                        request.length,
                        request.address
                    );
                    vec![0u8; request.length]
                });
            let _ = reply.send(ReadResponse { data });
        }
        DspCommand::SetParameter {
            address,
            value,
            reply,
        } => {
            let _ = reply.send(dsp.set_parameter_value(value, address));
        }
        DspCommand::GetParameter {
            address,
            format,
            reply,
        } => {
            let _ = reply.send(dsp.get_parameter_value(address, format));
        }
        DspCommand::SetVolume {
            volume_db,
            address,
            relative,
            reply,
        } => {
            let _ = reply.send(dsp.set_volume(volume_db, address, relative));
        }
        DspCommand::SoftReset(reply) => {
            dsp.soft_reset();
            let _ = reply.send(());
        }
        DspCommand::HardReset { hold, reply } => {
            let _ = reply.send(dsp.hard_reset(hold));
        }
        DspCommand::CheckSafetyHash { cell, reply } => {
            let _ = reply.send(dsp.check_safety_hash(cell.as_ref()));
        }
    }
}

/// Async front end of the worker. Cheap to clone; one per connection.
#[derive(Clone, Debug)]
pub struct DspHandle {
    tx: mpsc::Sender<DspCommand>,
    family: ChipFamily,
}

impl DspHandle {
    #[must_use]
    pub const fn chip_family(&self) -> ChipFamily {
        self.family
    }

    async fn send(&self, command: DspCommand) -> Result<(), SigmaDspError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SigmaDspError::WorkerGone)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> DspCommand,
    ) -> Result<T, SigmaDspError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply)).await?;
        rx.await.map_err(|_| SigmaDspError::WorkerGone)?
    }

    /// Queue a direct write. Returns once the worker has accepted it.
    pub async fn write(&self, request: WriteRequest) -> Result<(), SigmaDspError> {
        self.send(DspCommand::Write(request)).await
    }

    pub async fn safeload(&self, request: SafeloadRequest) -> Result<(), SigmaDspError> {
        self.send(DspCommand::Safeload(request)).await
    }

    /// Read registers; waits until the worker has answered.
    pub async fn read(&self, request: ReadRequest) -> Result<ReadResponse, SigmaDspError> {
        let (reply, rx) = oneshot::channel();
        self.send(DspCommand::Read(request, reply)).await?;
        rx.await.map_err(|_| SigmaDspError::WorkerGone)
    }

    /// Forward a decoded SigmaStudio request. Only reads produce a response.
    pub async fn submit(&self, request: SigmaRequest) -> Result<Option<ReadResponse>, SigmaDspError> {
        match request {
            SigmaRequest::Write(w) => self.write(w).await.map(|()| None),
            SigmaRequest::Safeload(s) => self.safeload(s).await.map(|()| None),
            SigmaRequest::Read(r) => self.read(r).await.map(Some),
        }
    }

    pub async fn set_parameter_value(
        &self,
        value: ParameterValue,
        address: u16,
    ) -> Result<(), SigmaDspError> {
        self.request(|reply| DspCommand::SetParameter {
            address,
            value,
            reply,
        })
        .await
    }

    pub async fn get_parameter_value(
        &self,
        address: u16,
        format: ParameterFormat,
    ) -> Result<ParameterValue, SigmaDspError> {
        self.request(|reply| DspCommand::GetParameter {
            address,
            format,
            reply,
        })
        .await
    }

    pub async fn set_volume(
        &self,
        volume_db: f64,
        address: u16,
        relative: bool,
    ) -> Result<f64, SigmaDspError> {
        self.request(|reply| DspCommand::SetVolume {
            volume_db,
            address,
            relative,
            reply,
        })
        .await
    }

    pub async fn adjust_volume(&self, adjustment_db: f64, address: u16) -> Result<f64, SigmaDspError> {
        self.set_volume(adjustment_db, address, true).await
    }

    pub async fn soft_reset(&self) -> Result<(), SigmaDspError> {
        let (reply, rx) = oneshot::channel();
        self.send(DspCommand::SoftReset(reply)).await?;
        rx.await.map_err(|_| SigmaDspError::WorkerGone)
    }

    pub async fn hard_reset(&self, hold: Duration) -> Result<(), SigmaDspError> {
        self.request(|reply| DspCommand::HardReset { hold, reply }).await
    }

    pub async fn check_safety_hash(
        &self,
        cell: Option<SafetyHashCell>,
    ) -> Result<bool, SigmaDspError> {
        self.request(|reply| DspCommand::CheckSafetyHash { cell, reply })
            .await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config() -> Self {
        let cfg = global_config();
        Self {
            attempts: cfg.safety_retry_attempts.max(1),
            backoff: Duration::from_millis(cfg.safety_retry_backoff_ms),
        }
    }
}

/// Tracks whether the DSP runs the program the parameter file belongs to.
/// Parameter writes from a control surface must be refused while locked.
#[derive(Debug, Default)]
pub struct SafetyGate {
    configuration_unlocked: AtomicBool,
}

impl SafetyGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_unlocked(&self) -> bool {
        self.configuration_unlocked.load(Ordering::Acquire)
    }

    /// Run the hash comparison once and record the outcome.
    pub async fn check(
        &self,
        handle: &DspHandle,
        cell: Option<SafetyHashCell>,
    ) -> Result<bool, SigmaDspError> {
        let outcome = handle.check_safety_hash(cell).await;
        let unlocked = matches!(outcome, Ok(true));
        self.configuration_unlocked.store(unlocked, Ordering::Release);
        outcome
    }

    /// Check right after startup, retrying while the chip may still be
    /// booting. Without a hash cell there is nothing to wait for.
    pub async fn startup_check(
        &self,
        handle: &DspHandle,
        cell: Option<SafetyHashCell>,
        policy: RetryPolicy,
    ) -> bool {
        log::info!("Run startup safety check");
        for attempt in 1..=policy.attempts {
            match self.check(handle, cell).await {
                Ok(true) => return true,
                Ok(false) if cell.is_none() => break,
                Ok(false) => {}
                Err(SigmaDspError::WorkerGone) => break,
                Err(e) => log::warn!("Safety check attempt {attempt} failed: {e}"),
            }
            if attempt < policy.attempts {
                tokio::time::sleep(policy.backoff).await;
            }
        }
        log::warn!("Startup safety check failed");
        false
    }
}
