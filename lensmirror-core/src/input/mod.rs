//! Mirrored camera input
//!
//! [`MirrorInput`] adapts a [`CaptureSession`] into a stable video input:
//! it delivers frames and exposes position, orientation, mirroring and
//! field of view, while the camera behind it can change at any time.
//!
//! Threads involved:
//! - the session's delivery thread calls the frame handler
//! - the configuration thread applies input swaps and connection writes
//! - callers of the setters receive attribute notifications synchronously

mod observers;
mod queue;

pub use observers::{AttributeObservers, AttributeSubscription, InputAttributes, InputDestination};
pub use queue::ConfigurationQueue;

use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

use crate::config::InputSettings;
use crate::error::{MirrorError, Result};
use crate::session::{
    CaptureSession, DeviceConfigurationLock, DeviceInput, SessionTransaction, VideoConnection,
};
use crate::types::{DeviceFormat, Frame, FrameSize, InputId, Position, VideoOrientation};

/// Name of the configuration worker thread
const CONFIGURATION_QUEUE_LABEL: &str = "lensmirror-config";

/// Mutable adapter state
#[derive(Debug)]
struct AdapterState {
    position: Position,
    frame_size: FrameSize,
    frame_orientation: VideoOrientation,
    video_orientation: VideoOrientation,
    field_of_view: f64,
    mirrored: bool,
    /// Format captured by `stop_running` and the input it came from
    stored_format: Option<(InputId, DeviceFormat)>,
    /// Input seen on the most recent frame or swap
    prev_input: Option<InputId>,
}

impl AdapterState {
    fn attributes(&self) -> InputAttributes {
        InputAttributes {
            position: self.position,
            frame_size: self.frame_size,
            frame_orientation: self.frame_orientation,
            video_orientation: self.video_orientation,
            mirrored: self.mirrored,
            field_of_view: self.field_of_view,
        }
    }
}

struct Inner {
    session: Arc<dyn CaptureSession>,
    state: Mutex<AdapterState>,
    destination: RwLock<Option<Arc<dyn InputDestination>>>,
    observers: AttributeObservers,
    queue: ConfigurationQueue,
}

impl Inner {
    /// Tell the destination and every observer about new attributes
    fn notify(&self, attributes: InputAttributes) {
        debug!(
            position = %attributes.position,
            mirrored = attributes.mirrored,
            video_orientation = %attributes.video_orientation,
            frame_orientation = %attributes.frame_orientation,
            "Input attributes changed"
        );

        let destination = self.destination.read().clone();
        if let Some(destination) = destination {
            destination.input_changed_attributes(&attributes);
        }
        self.observers.publish(attributes);
    }

    /// Recompute derived state for a newly observed device input
    fn update_input(&self, input: &DeviceInput) -> InputAttributes {
        let format = input.device().active_format();
        let mut state = self.state.lock();

        state.field_of_view = format.field_of_view;
        state.position = input.position();
        state.frame_size = format.size;
        state.mirrored = state.position.mirrored_by_default();
        state.prev_input = Some(input.id());

        state.attributes()
    }

    /// Bring the live connection in line with the desired state
    ///
    /// Must run on the configuration queue.
    fn update_connection(&self) {
        debug_assert!(self.queue.is_current());

        let (mirrored, orientation) = {
            let state = self.state.lock();
            (state.mirrored, state.video_orientation)
        };

        let connection = self.session.connection();
        if connection.is_mirrored() != mirrored {
            connection.set_mirrored(mirrored);
        }
        if connection.orientation() != orientation {
            connection.set_orientation(orientation);
        }
        trace!(mirrored, %orientation, "Connection updated");
    }

    /// Queue a connection update without waiting for it
    fn schedule_connection_update(self: &Arc<Self>) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let queued = self.queue.dispatch(move || {
            if let Some(inner) = weak.upgrade() {
                inner.update_connection();
            }
        });

        if let Err(e) = queued {
            warn!("Failed to queue connection update: {}", e);
        }
    }

    /// Swap the attached camera for the one at `position`
    ///
    /// Runs on the configuration queue. The new input is opened before the
    /// old one is removed, and the old one is put back if the session
    /// refuses the new one.
    fn swap_input(&self, position: Position) -> Result<InputAttributes> {
        let new_input = self.session.open_device_input(position).map_err(|e| {
            warn!("Failed to open {} camera: {}", position, e);
            e
        })?;

        let _transaction = SessionTransaction::begin(self.session.as_ref());

        let previous = self.session.device_input();
        if let Some(previous) = &previous {
            self.session.remove_input(previous.id());
        }

        let added = if self.session.can_add_input(&new_input) {
            self.session.add_input(new_input.clone())
        } else {
            Err(MirrorError::session(format!(
                "Session rejected the {} camera input",
                position
            )))
        };

        if let Err(e) = added {
            warn!("Failed to add {} camera: {}", position, e);
            self.restore_input(previous);
            return Err(e);
        }

        if self.state.lock().stored_format.take().is_some() {
            debug!("Dropped format stored for the previous camera");
        }
        let attributes = self.update_input(&new_input);
        self.update_connection();

        info!(
            "Switched to {} ({})",
            new_input.device().name(),
            new_input.device().active_format()
        );
        Ok(attributes)
    }

    /// Put back an input removed by a failed swap
    fn restore_input(&self, previous: Option<DeviceInput>) {
        let Some(previous) = previous else {
            return;
        };

        let id = previous.id();
        match self.session.add_input(previous) {
            Ok(()) => debug!("Restored previous input {}", id),
            Err(e) => error!("Failed to restore previous input {}: {}", id, e),
        }
    }

    /// Remember the active format so a restart can bring it back
    fn store_format(&self) {
        let Some(input) = self.session.device_input() else {
            return;
        };

        let format = input.device().active_format();
        debug!("Stored active format {} for input {}", format, input.id());
        self.state.lock().stored_format = Some((input.id(), format));
    }

    /// Re-apply the stored format to the input it was taken from
    ///
    /// Returns the refreshed attributes when the format was restored. A
    /// refused format stays stored for the next start.
    fn restore_format(&self) -> Option<InputAttributes> {
        let (id, format) = self.state.lock().stored_format?;
        let input = self.session.device_input().filter(|input| input.id() == id);
        let Some(input) = input else {
            debug!("Stored format belongs to input {}, discarding", id);
            self.state.lock().stored_format = None;
            return None;
        };

        let restored = DeviceConfigurationLock::acquire(input.device().as_ref())
            .and_then(|lock| lock.set_active_format(format));

        match restored {
            Ok(()) => {
                debug!("Restored active format {}", format);
                let mut state = self.state.lock();
                state.stored_format = None;
                state.frame_size = format.size;
                state.field_of_view = format.field_of_view;
                Some(state.attributes())
            }
            Err(e) => {
                warn!("Failed to restore format {}: {}", format, e);
                None
            }
        }
    }

    /// Per-frame callback from the session
    fn handle_frame(self: &Arc<Self>, frame: &Frame, connection: &VideoConnection) {
        if let Some(bound) = connection.input_id() {
            let changed = self.state.lock().prev_input != Some(bound);
            if changed {
                let attributes = match self
                    .session
                    .device_input()
                    .filter(|input| input.id() == bound)
                {
                    Some(input) => {
                        debug!("Frame from new input {} ({})", bound, input.position());
                        self.update_input(&input)
                    }
                    None => {
                        let mut state = self.state.lock();
                        state.mirrored = state.position.mirrored_by_default();
                        state.prev_input = Some(bound);
                        state.attributes()
                    }
                };

                self.schedule_connection_update();
                self.notify(attributes);
            }
        }

        let destination = self.destination.read().clone();
        if let Some(destination) = destination {
            destination.input_received_frame(frame);
        }
        trace!(sequence = frame.sequence, "Frame delivered");
    }
}

/// Camera input that keeps preview, capture and rendering consistent
pub struct MirrorInput {
    inner: Arc<Inner>,
}

impl MirrorInput {
    /// Create the input and attach it to `session`
    ///
    /// When the session has no camera yet, the configured one is opened.
    /// Failing to open it is not fatal: the input starts without a camera
    /// and a later `set_position` can attach one.
    pub fn new(session: Arc<dyn CaptureSession>, settings: InputSettings) -> Result<Self> {
        settings.validate_strict().map_err(MirrorError::Config)?;

        let state = AdapterState {
            position: settings.position,
            frame_size: settings.display_size,
            frame_orientation: settings.frame_orientation,
            video_orientation: settings.video_orientation,
            field_of_view: settings.field_of_view,
            mirrored: settings.position.mirrored_by_default(),
            stored_format: None,
            prev_input: None,
        };

        let inner = Arc::new(Inner {
            session: Arc::clone(&session),
            state: Mutex::new(state),
            destination: RwLock::new(None),
            observers: AttributeObservers::new(),
            queue: ConfigurationQueue::new(CONFIGURATION_QUEUE_LABEL)?,
        });

        let weak = Arc::downgrade(&inner);
        session.set_frame_handler(Some(Arc::new(
            move |frame: &Frame, connection: &VideoConnection| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_frame(frame, connection);
                }
            },
        )));

        let initial = settings.position;
        let setup = Arc::clone(&inner);
        let attached = inner.queue.dispatch_sync(move || {
            let attached = if setup.session.device_input().is_none() {
                Some(setup.swap_input(initial))
            } else {
                None
            };

            let _transaction = SessionTransaction::begin(setup.session.as_ref());
            setup.update_connection();
            attached
        })?;

        if let Some(Err(e)) = attached {
            warn!(
                "Starting without a camera, {} camera unavailable: {}",
                initial, e
            );
        }

        info!("Mirror input ready");
        Ok(Self { inner })
    }

    /// Switch to the camera at `position`
    ///
    /// Does nothing if that camera is already active. On failure the
    /// previous camera stays attached.
    pub fn set_position(&self, position: Position) -> Result<()> {
        if self.position() == position && self.inner.session.device_input().is_some() {
            debug!("Already using the {} camera", position);
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let attributes = self
            .inner
            .queue
            .dispatch_sync(move || inner.swap_input(position))??;

        self.inner.notify(attributes);
        Ok(())
    }

    /// Set the logical orientation of delivered frames
    pub fn set_frame_orientation(&self, orientation: VideoOrientation) {
        let attributes = {
            let mut state = self.inner.state.lock();
            state.frame_orientation = orientation;
            state.attributes()
        };
        self.inner.notify(attributes);
    }

    /// Set the capture connection orientation
    ///
    /// Observers see the new value immediately; the connection follows
    /// once the configuration queue gets to it.
    pub fn set_video_orientation(&self, orientation: VideoOrientation) {
        let attributes = {
            let mut state = self.inner.state.lock();
            state.video_orientation = orientation;
            state.attributes()
        };
        self.inner.notify(attributes);
        self.inner.schedule_connection_update();
    }

    /// Flip mirroring, returning the new value
    pub fn toggle_video_mirror(&self) -> bool {
        let attributes = {
            let mut state = self.inner.state.lock();
            state.mirrored = !state.mirrored;
            state.attributes()
        };
        self.inner.notify(attributes);
        self.inner.schedule_connection_update();
        attributes.mirrored
    }

    /// Restore the format saved by `stop_running`, then start the session
    pub fn start_running(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let restored = self.inner.queue.dispatch_sync(move || {
            let restored = inner.restore_format();
            inner.session.start_running();
            restored
        })?;

        if let Some(attributes) = restored {
            self.inner.notify(attributes);
        }
        info!("Capture started");
        Ok(())
    }

    /// Save the active format, then stop the session
    pub fn stop_running(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.inner.queue.dispatch_sync(move || {
            inner.store_format();
            inner.session.stop_running();
        })?;
        info!("Capture stopped");
        Ok(())
    }

    /// Whether the session is delivering frames
    pub fn is_running(&self) -> bool {
        self.inner.session.is_running()
    }

    /// Install or clear the downstream consumer
    pub fn set_destination(&self, destination: Option<Arc<dyn InputDestination>>) {
        *self.inner.destination.write() = destination;
    }

    /// Observe attribute changes until the returned handle is dropped
    pub fn subscribe(&self) -> AttributeSubscription {
        self.inner.observers.subscribe()
    }

    /// Number of live attribute subscriptions
    pub fn observer_count(&self) -> usize {
        self.inner.observers.observer_count()
    }

    /// Wait until every queued connection write has been applied
    pub fn flush(&self) -> Result<()> {
        self.inner.queue.flush()
    }

    /// Current attributes
    pub fn attributes(&self) -> InputAttributes {
        self.inner.state.lock().attributes()
    }

    /// Active camera position
    pub fn position(&self) -> Position {
        self.inner.state.lock().position
    }

    /// Size of delivered frames
    pub fn frame_size(&self) -> FrameSize {
        self.inner.state.lock().frame_size
    }

    /// Horizontal field of view in degrees
    pub fn horizontal_field_of_view(&self) -> f64 {
        self.inner.state.lock().field_of_view
    }

    /// Whether frames are mirrored
    pub fn is_mirrored(&self) -> bool {
        self.inner.state.lock().mirrored
    }
}

impl Drop for MirrorInput {
    fn drop(&mut self) {
        self.inner.session.set_frame_handler(None);
    }
}
