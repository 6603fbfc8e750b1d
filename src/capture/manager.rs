use anyhow::{anyhow, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::analysis::pipeline::SharedPipeline;
use crate::capture::source::{strip_prefix, CaptureSource, NextFrame, PcapSource};
use crate::models::config::AppConfig;
use crate::models::interface::default_interface;
use crate::utils::clock::now_timestamp;

/// Consecutive read errors after which the capture loop gives up
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Pause between failed reads
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Capture state reported to the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub is_running: bool,
    pub interface: Option<String>,
    pub frames_captured: u64,
    pub prefix_len: usize,
}

/// Owns the capture thread and feeds every frame to the shared pipeline
pub struct CaptureManager {
    config: AppConfig,
    pipeline: SharedPipeline,

    /// Stop flag of the current run, cleared to ask its thread to stop. The thread clears it
    /// itself when it exits. Every run gets a fresh flag.
    is_running: Arc<AtomicBool>,

    /// Frames handed to the pipeline since the manager was created
    frames_captured: Arc<AtomicU64>,

    /// Interface (or file) of the current or last capture
    selected: Option<String>,

    capture_thread: Option<JoinHandle<()>>,
}

impl CaptureManager {
    pub fn new(config: AppConfig, pipeline: SharedPipeline) -> Self {
        Self {
            config,
            pipeline,
            is_running: Arc::new(AtomicBool::new(false)),
            frames_captured: Arc::new(AtomicU64::new(0)),
            selected: None,
            capture_thread: None,
        }
    }

    /// Open the configured pcap file or interface and start capturing.
    ///
    /// Without an explicit interface the first up, non-loopback interface is used.
    pub fn start_capture(&mut self) -> Result<()> {
        if self.get_status() {
            return Err(anyhow!("Capture is already running"));
        }

        let filter = self.config.filter.as_deref();
        let (name, source) = match &self.config.read_file {
            Some(path) => {
                let source = PcapSource::open_file(path, filter)
                    .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
                (path.display().to_string(), source)
            }
            None => {
                let interface = match &self.config.interface {
                    Some(name) => name.clone(),
                    None => {
                        info!("No interface specified, trying to find a default one");
                        default_interface()
                            .map(|iface| iface.device_name)
                            .ok_or_else(|| anyhow!("No interface specified and no usable default found"))?
                    }
                };
                let source = PcapSource::open_live(&interface, self.config.promiscuous, filter)
                    .map_err(|e| {
                        anyhow!("Failed to open capture on {}: {}. Capturing usually requires root or CAP_NET_RAW.", interface, e)
                    })?;
                (interface, source)
            }
        };

        self.start_with_source(name, Box::new(source))
    }

    /// Start the capture thread on an already opened source
    pub fn start_with_source(&mut self, name: String, source: Box<dyn CaptureSource>) -> Result<()> {
        if self.get_status() {
            return Err(anyhow!("Capture is already running"));
        }
        // A stopped thread may still sit in its last read; it exits on its own flag
        if let Some(previous) = self.capture_thread.take() {
            if previous.is_finished() {
                if previous.join().is_err() {
                    warn!("Capture thread panicked");
                }
            } else {
                debug!("Previous capture thread still finishing its last read");
            }
        }

        info!("Starting capture on {}", name);
        self.is_running = Arc::new(AtomicBool::new(true));

        let pipeline = self.pipeline.clone();
        let is_running = self.is_running.clone();
        let frames_captured = self.frames_captured.clone();
        let prefix_len = self.config.prefix_len;
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                Self::run_capture(source, pipeline, is_running, frames_captured, prefix_len, thread_name)
            });

        match handle {
            Ok(handle) => {
                self.capture_thread = Some(handle);
                self.selected = Some(name);
                Ok(())
            }
            Err(e) => {
                self.is_running.store(false, Ordering::SeqCst);
                Err(anyhow!("Failed to spawn capture thread: {}", e))
            }
        }
    }

    /// Read frames until stopped, the source closes, or reads keep failing
    fn run_capture(
        mut source: Box<dyn CaptureSource>,
        pipeline: SharedPipeline,
        is_running: Arc<AtomicBool>,
        frames_captured: Arc<AtomicU64>,
        prefix_len: usize,
        name: String,
    ) {
        info!("Starting capture loop for {}", name);
        let mut consecutive_errors = 0;

        while is_running.load(Ordering::SeqCst) {
            match source.next_frame() {
                Ok(NextFrame::Data(raw)) => {
                    consecutive_errors = 0;

                    let frame = match strip_prefix(&raw, prefix_len) {
                        Some(frame) => frame,
                        None => {
                            debug!("Dropping {} byte buffer with no frame after the prefix", raw.len());
                            continue;
                        }
                    };

                    let now = now_timestamp();
                    pipeline.lock().process_frame(frame, now);
                    frames_captured.fetch_add(1, Ordering::Relaxed);
                }
                Ok(NextFrame::Idle) => {}
                Ok(NextFrame::Closed) => {
                    info!("Capture source {} closed", name);
                    break;
                }
                Err(e) => {
                    error!("Error capturing packet: {}", e);
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("Too many consecutive errors ({}), stopping capture", consecutive_errors);
                        break;
                    }
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }

        is_running.store(false, Ordering::SeqCst);
        info!("Capture loop stopped for {}", name);
    }

    /// Ask the capture thread to stop; it exits after its current read returns
    pub fn stop_capture(&mut self) -> Result<()> {
        if !self.get_status() {
            return Err(anyhow!("Capture is not running"));
        }

        info!("Stopping packet capture");
        self.is_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Block until the capture thread has exited
    pub fn wait(&mut self) {
        self.join_capture_thread();
    }

    fn join_capture_thread(&mut self) {
        if let Some(handle) = self.capture_thread.take() {
            if handle.join().is_err() {
                warn!("Capture thread panicked");
            }
        }
    }

    pub fn get_status(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> CaptureStatus {
        CaptureStatus {
            is_running: self.get_status(),
            interface: self.selected.clone(),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            prefix_len: self.config.prefix_len,
        }
    }

    pub fn get_selected_interface(&self) -> Option<String> {
        self.selected.clone()
    }

    /// Capture on `interface` next time; clears any pcap file replay
    pub fn set_interface(&mut self, interface: String) {
        self.config.interface = Some(interface);
        self.config.read_file = None;
    }

    pub fn set_promiscuous(&mut self, promiscuous: bool) {
        self.config.promiscuous = promiscuous;
    }

    pub fn set_filter(&mut self, filter: String) {
        self.config.filter = if filter.is_empty() { None } else { Some(filter) };
    }

    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}
