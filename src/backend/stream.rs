//! Launch streams backed by a dedicated rayon pool

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::Device;
use crate::error::{ForgeResult, WarpForgeError};
use crate::kernels::softmax::LaunchGeometry;

const NUM_THREADS_ENV: &str = "WARPFORGE_NUM_THREADS";
const DEVICE_ENV: &str = "WARPFORGE_DEVICE";

/// Configuration for an [`ExecutionStream`]
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Device the stream launches onto
    pub device: Device,
    /// Worker threads; `None` lets rayon pick (one per logical core)
    pub num_threads: Option<usize>,
    /// Prefix for worker thread names
    pub thread_name_prefix: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            device: Device::default(),
            num_threads: None,
            thread_name_prefix: "warpforge".to_string(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `WARPFORGE_NUM_THREADS` and `WARPFORGE_DEVICE` on top of the defaults
    pub fn from_env() -> ForgeResult<Self> {
        let mut config = StreamConfig::new();

        if let Ok(raw) = std::env::var(NUM_THREADS_ENV) {
            let threads = raw.trim().parse::<usize>().map_err(|_| {
                WarpForgeError::InvalidConfiguration(format!(
                    "{} must be a positive integer, got '{}'",
                    NUM_THREADS_ENV, raw
                ))
            })?;
            config.num_threads = Some(threads);
        }

        if let Ok(raw) = std::env::var(DEVICE_ENV) {
            let ordinal = raw.trim().parse::<usize>().map_err(|_| {
                WarpForgeError::InvalidConfiguration(format!(
                    "{} must be a device ordinal, got '{}'",
                    DEVICE_ENV, raw
                ))
            })?;
            config.device = Device::cpu(ordinal);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if self.num_threads == Some(0) {
            return Err(WarpForgeError::InvalidConfiguration(
                "num_threads must be > 0".to_string(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(WarpForgeError::InvalidConfiguration(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

struct StreamInner {
    device: Device,
    pool: rayon::ThreadPool,
    launches: AtomicU64,
}

/// Ordered launch queue for one device.
///
/// Each launch runs to completion on the stream's pool before
/// [`ExecutionStream::launch`] returns, so a forward pass is always finished
/// before a backward pass issued after it on the same stream reads its
/// output. Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct ExecutionStream {
    inner: Arc<StreamInner>,
}

impl std::fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStream")
            .field("device", &self.inner.device)
            .field("num_threads", &self.inner.pool.current_num_threads())
            .field("launches", &self.launch_count())
            .finish()
    }
}

impl ExecutionStream {
    pub fn new(config: StreamConfig) -> ForgeResult<Self> {
        config.validate()?;

        let prefix = config.thread_name_prefix.clone();
        let ordinal = config.device.ordinal();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(move |i| format!("{}-{}-{}", prefix, ordinal, i));
        if let Some(threads) = config.num_threads {
            builder = builder.num_threads(threads);
        }

        let pool = builder
            .build()
            .map_err(|e| WarpForgeError::BackendInitializationFailed(e.to_string()))?;

        tracing::debug!(
            device = %config.device,
            threads = pool.current_num_threads(),
            "created execution stream"
        );

        Ok(ExecutionStream {
            inner: Arc::new(StreamInner {
                device: config.device,
                pool,
                launches: AtomicU64::new(0),
            }),
        })
    }

    /// Stream configured from `WARPFORGE_*` environment variables
    pub fn from_env() -> ForgeResult<Self> {
        Self::new(StreamConfig::from_env()?)
    }

    pub fn device(&self) -> Device {
        self.inner.device
    }

    pub fn num_threads(&self) -> usize {
        self.inner.pool.current_num_threads()
    }

    /// Number of launches that have completed on this stream
    pub fn launch_count(&self) -> u64 {
        self.inner.launches.load(Ordering::Acquire)
    }

    /// Run `kernel` on this stream's pool.
    ///
    /// The closure executes inside `ThreadPool::install`, so any rayon
    /// parallelism it uses lands on this stream's workers. A panic inside the
    /// kernel aborts the whole launch and propagates to the caller.
    pub fn launch<R, F>(&self, name: &'static str, geometry: &LaunchGeometry, kernel: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        let span = tracing::debug_span!(
            "kernel_launch",
            kernel = name,
            device = %self.inner.device,
            rows = geometry.rows(),
            cols = geometry.cols(),
            grid = geometry.grid_dim().0,
            block = geometry.block_dim().0,
        );
        let _enter = span.enter();

        let start = Instant::now();
        let result = self.inner.pool.install(kernel);
        self.inner.launches.fetch_add(1, Ordering::AcqRel);

        tracing::trace!(elapsed_us = start.elapsed().as_micros() as u64, "kernel complete");
        result
    }

    /// Wait for all previously issued launches.
    ///
    /// Launches are completed before `launch` returns, so there is never
    /// anything outstanding.
    pub fn synchronize(&self) -> ForgeResult<()> {
        Ok(())
    }
}
