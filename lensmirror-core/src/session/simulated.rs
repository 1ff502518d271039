//! In-process capture backend
//!
//! Provides a front and a back camera with a small format catalogue and
//! produces synthetic NV12 frames. Hosts without camera hardware and the
//! test suite drive the input adapter through it.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

use super::{CaptureDevice, CaptureSession, DeviceInput, FrameHandler, VideoConnection};
use crate::error::{MirrorError, Result};
use crate::types::{DeviceFormat, Frame, InputId, Position, VideoOrientation};

/// Whether a simulated camera can be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceAvailability {
    /// Opens normally
    #[default]
    Available,
    /// Not present on this device
    Missing,
    /// Present, but access was refused
    Denied,
}

/// A simulated camera
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    position: Position,
    formats: Vec<DeviceFormat>,
    active: Mutex<DeviceFormat>,
    locked: AtomicBool,
    lock_count: AtomicU64,
    fail_lock: AtomicBool,
}

impl SimulatedDevice {
    /// Create a device; the first format becomes the active one
    pub fn new(name: impl Into<String>, position: Position, formats: Vec<DeviceFormat>) -> Self {
        let active = formats
            .first()
            .copied()
            .unwrap_or_else(|| DeviceFormat::new(1280, 720, 30, 78.0));

        Self {
            name: name.into(),
            position,
            formats,
            active: Mutex::new(active),
            locked: AtomicBool::new(false),
            lock_count: AtomicU64::new(0),
            fail_lock: AtomicBool::new(false),
        }
    }

    /// Formats this camera supports
    pub fn formats(&self) -> &[DeviceFormat] {
        &self.formats
    }

    /// Whether the configuration lock is currently held
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// How many times the configuration lock has been taken
    pub fn lock_count(&self) -> u64 {
        self.lock_count.load(Ordering::SeqCst)
    }

    /// Make subsequent lock attempts fail
    pub fn set_fail_lock(&self, fail: bool) {
        self.fail_lock.store(fail, Ordering::SeqCst);
    }

    /// Drop back to the default format, as the platform does on interruption
    pub fn reset_format(&self) {
        if let Some(first) = self.formats.first() {
            *self.active.lock() = *first;
        }
    }
}

impl CaptureDevice for SimulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn position(&self) -> Position {
        self.position
    }

    fn active_format(&self) -> DeviceFormat {
        *self.active.lock()
    }

    fn lock_for_configuration(&self) -> Result<()> {
        if self.fail_lock.load(Ordering::SeqCst) {
            return Err(MirrorError::device_lock(format!(
                "{} refused the configuration lock",
                self.name
            )));
        }

        if self.locked.swap(true, Ordering::SeqCst) {
            return Err(MirrorError::device_lock(format!(
                "{} is already locked",
                self.name
            )));
        }

        self.lock_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    fn set_active_format(&self, format: DeviceFormat) -> Result<()> {
        if !self.is_locked() {
            return Err(MirrorError::device_lock(format!(
                "{} must be locked before changing its format",
                self.name
            )));
        }

        if !self.formats.contains(&format) {
            return Err(MirrorError::device_lock(format!(
                "{} does not support {}",
                self.name, format
            )));
        }

        *self.active.lock() = format;
        Ok(())
    }
}

/// Shared state between the session handle and its delivery thread
struct SessionInner {
    devices: HashMap<Position, Arc<SimulatedDevice>>,
    availability: Mutex<HashMap<Position, DeviceAvailability>>,
    inputs: Mutex<Vec<DeviceInput>>,
    rejected_position: Mutex<Option<Position>>,
    connection: Arc<VideoConnection>,
    handler: RwLock<Option<FrameHandler>>,
    running: AtomicBool,
    configuration_depth: AtomicU32,
    commit_count: AtomicU64,
    sequence: AtomicU64,
    epoch: Instant,
}

impl SessionInner {
    /// Deliver one frame from the attached input
    fn emit_frame(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }

        // Frames are held back while a transaction is open
        if self.configuration_depth.load(Ordering::SeqCst) > 0 {
            trace!("Skipping frame during configuration");
            return false;
        }

        let Some(input) = self.inputs.lock().first().cloned() else {
            return false;
        };

        let Some(handler) = self.handler.read().clone() else {
            return false;
        };

        let format = input.device().active_format();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let luma = (sequence % 220) as u8 + 16;
        let pts = self.epoch.elapsed().as_nanos() as u64;
        let frame = Frame::nv12(format.size, luma, pts, sequence);

        handler(&frame, &self.connection);
        true
    }
}

/// Background frame producer
struct DeliveryThread {
    shutdown_tx: mpsc::Sender<()>,
    thread: std::thread::JoinHandle<()>,
}

/// Simulated capture session with a front and a back camera
pub struct SimulatedSession {
    inner: Arc<SessionInner>,
    delivery: Mutex<Option<DeliveryThread>>,
}

impl SimulatedSession {
    /// Create a session with the default front and back cameras
    pub fn new() -> Self {
        let front = SimulatedDevice::new(
            "Simulated Front Camera",
            Position::Front,
            vec![
                DeviceFormat::new(1280, 720, 30, 65.0),
                DeviceFormat::new(1920, 1080, 30, 70.3),
                DeviceFormat::new(1920, 1080, 60, 70.3),
            ],
        );
        let back = SimulatedDevice::new(
            "Simulated Back Camera",
            Position::Back,
            vec![
                DeviceFormat::new(1920, 1080, 30, 63.4),
                DeviceFormat::new(3840, 2160, 30, 63.4),
                DeviceFormat::new(1280, 720, 60, 58.0),
            ],
        );

        Self::with_devices(vec![front, back])
    }

    /// Create a session from an explicit set of cameras
    pub fn with_devices(devices: Vec<SimulatedDevice>) -> Self {
        let devices = devices
            .into_iter()
            .map(|device| (device.position, Arc::new(device)))
            .collect();

        Self {
            inner: Arc::new(SessionInner {
                devices,
                availability: Mutex::new(HashMap::new()),
                inputs: Mutex::new(Vec::new()),
                rejected_position: Mutex::new(None),
                connection: Arc::new(VideoConnection::new(VideoOrientation::Portrait, false)),
                handler: RwLock::new(None),
                running: AtomicBool::new(false),
                configuration_depth: AtomicU32::new(0),
                commit_count: AtomicU64::new(0),
                sequence: AtomicU64::new(0),
                epoch: Instant::now(),
            }),
            delivery: Mutex::new(None),
        }
    }

    /// The camera at `position`, if the session has one
    pub fn device(&self, position: Position) -> Option<Arc<SimulatedDevice>> {
        self.inner.devices.get(&position).cloned()
    }

    /// Control whether the camera at `position` can be opened
    pub fn set_availability(&self, position: Position, availability: DeviceAvailability) {
        self.inner.availability.lock().insert(position, availability);
    }

    /// Make `can_add_input` refuse inputs for the camera at `position`
    pub fn reject_inputs_from(&self, position: Option<Position>) {
        *self.inner.rejected_position.lock() = position;
    }

    /// Number of open configuration transactions
    pub fn configuration_depth(&self) -> u32 {
        self.inner.configuration_depth.load(Ordering::SeqCst)
    }

    /// Number of committed configuration transactions
    pub fn commit_count(&self) -> u64 {
        self.inner.commit_count.load(Ordering::SeqCst)
    }

    /// Replace the attached input behind the adapter's back
    ///
    /// Emulates another component reconfiguring the session; the adapter
    /// only learns about it from the next delivered frame.
    pub fn replace_input(&self, position: Position) -> Result<InputId> {
        let input = self.open_device_input(position)?;
        let id = input.id();

        self.begin_configuration();
        if let Some(current) = self.device_input() {
            self.remove_input(current.id());
        }
        let added = self.add_input(input);
        self.commit_configuration();

        added.map(|_| id)
    }

    /// Reset every camera to its default format
    pub fn interrupt(&self) {
        info!("Simulating capture interruption");
        for device in self.inner.devices.values() {
            device.reset_format();
        }
    }

    /// Deliver a single frame synchronously on the calling thread
    ///
    /// Returns false when nothing was delivered (not running, no input,
    /// no handler, or a transaction is open).
    pub fn emit_frame(&self) -> bool {
        self.inner.emit_frame()
    }

    /// Start a background thread delivering frames at `fps`
    pub fn start_delivery(&self, fps: u32) -> Result<()> {
        let mut delivery = self.delivery.lock();
        if delivery.is_some() {
            return Ok(());
        }

        let interval = Duration::from_secs(1) / fps.max(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let inner = Arc::clone(&self.inner);

        let thread = std::thread::Builder::new()
            .name("lensmirror-delivery".to_string())
            .spawn(move || {
                debug!("Frame delivery started at {:?} per frame", interval);
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {
                            inner.emit_frame();
                        }
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Frame delivery stopped");
            })
            .map_err(|e| MirrorError::session(format!("Failed to spawn delivery thread: {}", e)))?;

        *delivery = Some(DeliveryThread { shutdown_tx, thread });
        Ok(())
    }

    /// Stop the background delivery thread
    pub fn stop_delivery(&self) {
        if let Some(delivery) = self.delivery.lock().take() {
            let _ = delivery.shutdown_tx.send(());
            // The last handle can be released from inside a frame callback
            if delivery.thread.thread().id() == std::thread::current().id() {
                return;
            }
            if delivery.thread.join().is_err() {
                error!("Frame delivery thread panicked");
            }
        }
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SimulatedSession {
    fn drop(&mut self) {
        self.stop_delivery();
    }
}

impl CaptureSession for SimulatedSession {
    fn begin_configuration(&self) {
        self.inner.configuration_depth.fetch_add(1, Ordering::SeqCst);
    }

    fn commit_configuration(&self) {
        let previous = self
            .inner
            .configuration_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |depth| {
                depth.checked_sub(1)
            });

        match previous {
            Ok(_) => {
                self.inner.commit_count.fetch_add(1, Ordering::SeqCst);
            }
            Err(_) => error!("commit_configuration called without begin_configuration"),
        }
    }

    fn device_input(&self) -> Option<DeviceInput> {
        self.inner.inputs.lock().first().cloned()
    }

    fn open_device_input(&self, position: Position) -> Result<DeviceInput> {
        let availability = self
            .inner
            .availability
            .lock()
            .get(&position)
            .copied()
            .unwrap_or_default();

        match availability {
            DeviceAvailability::Missing => return Err(MirrorError::DeviceUnavailable(position)),
            DeviceAvailability::Denied => return Err(MirrorError::PermissionDenied(position)),
            DeviceAvailability::Available => {}
        }

        let device = self
            .inner
            .devices
            .get(&position)
            .cloned()
            .ok_or(MirrorError::DeviceUnavailable(position))?;

        Ok(DeviceInput::new(device))
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        let rejected = *self.inner.rejected_position.lock() == Some(input.position());
        !rejected && self.inner.inputs.lock().is_empty()
    }

    fn add_input(&self, input: DeviceInput) -> Result<()> {
        if !self.can_add_input(&input) {
            return Err(MirrorError::session(format!(
                "Cannot add {} camera input",
                input.position()
            )));
        }

        let id = input.id();
        self.inner.inputs.lock().push(input);
        self.inner.connection.bind_input(Some(id));
        Ok(())
    }

    fn remove_input(&self, id: InputId) -> Option<DeviceInput> {
        let removed = {
            let mut inputs = self.inner.inputs.lock();
            let index = inputs.iter().position(|input| input.id() == id)?;
            inputs.remove(index)
        };

        if self.inner.connection.input_id() == Some(id) {
            self.inner.connection.bind_input(None);
        }
        Some(removed)
    }

    fn connection(&self) -> Arc<VideoConnection> {
        Arc::clone(&self.inner.connection)
    }

    fn set_frame_handler(&self, handler: Option<FrameHandler>) {
        *self.inner.handler.write() = handler;
    }

    fn start_running(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
    }

    fn stop_running(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DeviceConfigurationLock, SessionTransaction};

    #[test]
    fn test_open_respects_availability() {
        let session = SimulatedSession::new();
        session.set_availability(Position::Back, DeviceAvailability::Missing);
        assert!(matches!(
            session.open_device_input(Position::Back),
            Err(MirrorError::DeviceUnavailable(Position::Back))
        ));

        session.set_availability(Position::Front, DeviceAvailability::Denied);
        assert!(matches!(
            session.open_device_input(Position::Front),
            Err(MirrorError::PermissionDenied(Position::Front))
        ));
    }

    #[test]
    fn test_single_video_input() {
        let session = SimulatedSession::new();
        let front = session.open_device_input(Position::Front).unwrap();
        let back = session.open_device_input(Position::Back).unwrap();

        session.add_input(front.clone()).unwrap();
        assert_eq!(session.connection().input_id(), Some(front.id()));
        assert!(!session.can_add_input(&back));
        assert!(session.add_input(back).is_err());

        session.remove_input(front.id());
        assert_eq!(session.connection().input_id(), None);
    }

    #[test]
    fn test_rejected_position() {
        let session = SimulatedSession::new();
        session.reject_inputs_from(Some(Position::Back));

        let back = session.open_device_input(Position::Back).unwrap();
        let front = session.open_device_input(Position::Front).unwrap();
        assert!(!session.can_add_input(&back));
        assert!(session.can_add_input(&front));
    }

    #[test]
    fn test_transaction_commits_on_drop() {
        let session = SimulatedSession::new();
        {
            let _tx = SessionTransaction::begin(&session);
            assert_eq!(session.configuration_depth(), 1);
        }
        assert_eq!(session.configuration_depth(), 0);
        assert_eq!(session.commit_count(), 1);
    }

    #[test]
    fn test_lock_released_after_failed_format_change() {
        let session = SimulatedSession::new();
        let device = session.device(Position::Front).unwrap();
        let unsupported = DeviceFormat::new(7, 7, 1, 1.0);

        {
            let lock = DeviceConfigurationLock::acquire(device.as_ref()).unwrap();
            assert!(device.is_locked());
            assert!(lock.set_active_format(unsupported).is_err());
        }

        assert!(!device.is_locked());
        assert!(device.set_active_format(device.formats()[1]).is_err());
    }

    #[test]
    fn test_no_frames_while_configuring() {
        let session = SimulatedSession::new();
        let input = session.open_device_input(Position::Front).unwrap();
        session.add_input(input).unwrap();
        session.set_frame_handler(Some(Arc::new(|_: &Frame, _: &VideoConnection| {})));
        session.start_running();

        session.begin_configuration();
        assert!(!session.emit_frame());
        session.commit_configuration();
        assert!(session.emit_frame());
    }
}
