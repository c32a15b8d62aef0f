//! The map viewport: camera, gestures, elements and history in one place.
//!
//! A host owns one [`Viewport`] per map instance, feeds it normalized input,
//! and receives notifications through a [`ViewportHooks`] implementation.
//! Input handling and element bookkeeping are synchronous. Anything that
//! touches the history object store is async and must be awaited by the
//! host; `&mut self` receivers keep those operations from overlapping.

use crate::camera::{Camera, ViewportFrame};
use crate::config::ViewportConfig;
use crate::element::{
    ElementId, ElementRegistry, RegistryEvent, TrackedElement, deserialize_records, serialize_records,
};
use crate::gesture::{GestureContext, GestureController, GestureEvent};
use crate::history::{HistoryError, HistoryIndex, HistoryManager};
use crate::input::{KeyCommand, KeyInput, MouseInput, PointerIntent, TouchInput, TouchTracker, WheelInput};
use crate::storage::{
    Compressor, ObjectStore, RecordKey, ScalarStore, SessionStore, StorageError, StorageResult,
    default_compressor,
};
use kurbo::{Affine, Point, Size, Vec2};
use std::collections::HashMap;

/// Host callbacks. Every method has a no-op default.
pub trait ViewportHooks {
    fn on_click(&mut self, _local: Point) {}
    fn on_mouse_down(&mut self, _local: Point) {}
    fn on_mouse_up(&mut self, _local: Point) {}
    /// Pointer moved while no gesture was active.
    fn on_mouse_moving(&mut self, _local: Point) {}
    fn on_drag_threshold_start(&mut self) {}
    fn on_drag_threshold_stop(&mut self) {}
    fn on_camera_changed(&mut self, _camera: &Camera) {}
    fn on_element_create(&mut self, _element: &TrackedElement) {}
    fn on_element_update(&mut self, _element: &TrackedElement) {}
    fn on_element_delete(&mut self, _element: &TrackedElement) {}
    /// The history store finished opening.
    fn on_initialized(&mut self) {}
    /// The history window moved; use it to enable undo/redo controls.
    fn on_history_changed(&mut self, _index: HistoryIndex) {}
    /// A save or persisted-state write could not complete.
    fn on_save_failed(&mut self, _error: &HistoryError) {}
    /// Whether a press at `local` may start a pan gesture.
    fn can_drag(&self, _local: Point) -> bool {
        true
    }
    /// Whether keyboard commands are accepted, e.g. false while a text field has focus.
    fn can_do_key_commands(&self) -> bool {
        true
    }
    /// Asked before [`Viewport::reset`] destroys all persisted state.
    fn confirm_reset(&mut self) -> bool {
        false
    }
}

impl ViewportHooks for () {}

/// History navigation requested from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCommand {
    Undo,
    Redo,
}

/// Outcome of a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyResponse {
    /// The host should suppress the key's default action.
    pub prevent_default: bool,
    /// History navigation for the host to run with [`Viewport::apply`].
    pub history: Option<HistoryCommand>,
}

/// Size of debug markers, in local units.
const DEBUG_MARKER_SIZE: Size = Size::new(10.0, 10.0);

/// One map instance.
pub struct Viewport<H: ViewportHooks, S: ScalarStore> {
    config: ViewportConfig,
    frame: ViewportFrame,
    camera: Camera,
    gestures: GestureController,
    touches: TouchTracker,
    registry: ElementRegistry,
    history: HistoryManager,
    session: SessionStore<S>,
    objects: Option<Box<dyn ObjectStore>>,
    compressor: Box<dyn Compressor>,
    debug_markers: HashMap<String, ElementId>,
    hooks: H,
}

impl<H: ViewportHooks, S: ScalarStore> Viewport<H, S> {
    /// Create a viewport, restoring camera and history window from `scalars`.
    ///
    /// The history store is attached separately with [`Viewport::attach_store`].
    pub fn new(name: impl Into<String>, config: ViewportConfig, scalars: S, hooks: H) -> Self {
        let session = SessionStore::new(name, scalars);
        let offset = session.offset().unwrap_or_else(|| config.default_offset());
        let scale = session.scale().unwrap_or(config.default_scale);
        let camera = Camera::new(offset, scale, &config);
        let history = HistoryManager::new(session.history_index());

        let mut viewport = Self {
            config,
            frame: ViewportFrame::default(),
            camera,
            gestures: GestureController::new(),
            touches: TouchTracker::new(),
            registry: ElementRegistry::new(),
            history,
            session,
            objects: None,
            compressor: default_compressor(),
            debug_markers: HashMap::new(),
            hooks,
        };
        log::debug!(
            "Viewport {} restored at offset {:?}, scale {}",
            viewport.name(),
            viewport.camera.offset,
            viewport.camera.scale
        );

        if let Err(e) = viewport.write_session(|session, index| session.set_history_index(index)) {
            viewport.report(&e);
        }
        viewport.persist_camera();
        viewport
    }

    /// Replace the snapshot compressor.
    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn name(&self) -> &str {
        self.session.namespace()
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn frame(&self) -> &ViewportFrame {
        &self.frame
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn session(&self) -> &SessionStore<S> {
        &self.session
    }

    pub fn object_store(&self) -> Option<&dyn ObjectStore> {
        self.objects.as_deref()
    }

    pub fn history_index(&self) -> HistoryIndex {
        self.history.index()
    }

    /// Whether a snapshot is being loaded.
    pub fn is_loading(&self) -> bool {
        self.history.is_loading()
    }

    /// Whether the history store is attached and open.
    pub fn is_initialized(&self) -> bool {
        self.objects.is_some()
    }

    // --- Input ---

    pub fn mouse_down(&mut self, input: MouseInput) {
        if input.is_valid_press() {
            self.drive_intents([PointerIntent::Press(input.position)]);
        }
    }

    pub fn mouse_move(&mut self, input: MouseInput) {
        self.drive_intents([PointerIntent::Move(input.position)]);
    }

    pub fn mouse_up(&mut self, input: MouseInput) {
        if input.is_valid_press() {
            self.drive_intents([PointerIntent::Release(input.position)]);
        }
    }

    pub fn mouse_leave(&mut self) {
        self.drive_intents([PointerIntent::Leave]);
    }

    /// Zoom about the pointer unless the wheel is over a scrollable element.
    ///
    /// Returns whether the host should suppress the browser's own wheel
    /// handling, which is always the case.
    pub fn wheel(&mut self, input: WheelInput) -> bool {
        if input.zooms_map() {
            let amount = input.delta_y / self.config.wheel_divisor;
            self.drive_intents([PointerIntent::Zoom {
                anchor: input.position,
                amount,
            }]);
        }
        true
    }

    /// Touches that begin on a tracked element are ignored until they lift.
    pub fn touch_start(&mut self, input: &TouchInput) {
        let intents = self.touches.start(input);
        self.drive_intents(intents);
    }

    pub fn touch_move(&mut self, input: &TouchInput) {
        let intents = self.touches.moved(input, self.config.pinch_divisor);
        self.drive_intents(intents);
    }

    /// `input` holds the touches still down after the lift.
    pub fn touch_end(&mut self, input: &TouchInput) {
        let intents = self.touches.ended(input);
        self.drive_intents(intents);
    }

    pub fn key_down(&mut self, input: &KeyInput) -> KeyResponse {
        let mut response = KeyResponse::default();
        if !self.hooks.can_do_key_commands() {
            return response;
        }

        for command in KeyCommand::parse(input) {
            match command {
                KeyCommand::Undo => response.history = Some(HistoryCommand::Undo),
                KeyCommand::Redo => response.history = Some(HistoryCommand::Redo),
                command => {
                    if command == KeyCommand::Click {
                        response.prevent_default = true;
                    }
                    self.drive(|gestures, ctx, events| gestures.key(command, ctx, events));
                }
            }
        }
        response
    }

    fn drive_intents(&mut self, intents: impl IntoIterator<Item = PointerIntent>) {
        self.drive(|gestures, ctx, events| {
            for intent in intents {
                gestures.handle(intent, ctx, events);
            }
        });
    }

    /// Run the gesture controller against the camera and dispatch what it reports.
    fn drive(
        &mut self,
        f: impl FnOnce(&mut GestureController, &mut GestureContext<'_>, &mut Vec<GestureEvent>),
    ) {
        let mut events = Vec::new();
        {
            let hooks = &self.hooks;
            let mut can_drag = |local: Point| hooks.can_drag(local);
            let mut ctx = GestureContext {
                camera: &mut self.camera,
                frame: &self.frame,
                config: &self.config,
                can_drag: &mut can_drag,
            };
            f(&mut self.gestures, &mut ctx, &mut events);
        }

        for event in events {
            match event {
                GestureEvent::MouseDown(local) => self.hooks.on_mouse_down(local),
                GestureEvent::MouseMoving(local) => self.hooks.on_mouse_moving(local),
                GestureEvent::MouseUp(local) => self.hooks.on_mouse_up(local),
                GestureEvent::Click(local) => self.hooks.on_click(local),
                GestureEvent::DragThresholdStart => self.hooks.on_drag_threshold_start(),
                GestureEvent::DragThresholdStop => self.hooks.on_drag_threshold_stop(),
                GestureEvent::CameraChanged => self.camera_changed(),
            }
        }
    }

    // --- Camera ---

    pub fn pan(&mut self, delta: Vec2) {
        self.camera.pan(delta);
        self.camera_changed();
    }

    /// Zoom about a global anchor. Positive amounts zoom out.
    pub fn zoom_about(&mut self, anchor: Point, amount: f64) {
        self.camera.zoom_about(&self.frame, anchor, amount, &self.config);
        self.camera_changed();
    }

    /// Center an element at scale 1. Returns false if it is not registered.
    pub fn focus_element(&mut self, id: ElementId, move_up: bool) -> bool {
        let Some(element) = self.registry.get(id) else {
            return false;
        };
        let (position, size) = (element.position, element.size);
        self.camera.focus(&self.frame, position, size, move_up);
        self.camera_changed();
        true
    }

    pub fn center_coords(&self) -> Point {
        self.camera.center_coords(&self.frame)
    }

    pub fn to_local(&self, global: Point) -> Point {
        self.camera.to_local(&self.frame, global)
    }

    pub fn to_global(&self, local: Point) -> Point {
        self.camera.to_global(&self.frame, local)
    }

    /// Transform to apply to the map layer, relative to the frame origin.
    pub fn map_transform(&self) -> Affine {
        self.camera.transform()
    }

    pub fn is_within_map(&self, local: Point) -> bool {
        Camera::is_within_map(local, &self.config)
    }

    /// Update the viewport rectangle after a layout change.
    pub fn set_frame(&mut self, frame: ViewportFrame) {
        self.frame = frame;
    }

    fn camera_changed(&mut self) {
        self.persist_camera();
        self.hooks.on_camera_changed(&self.camera);
    }

    fn persist_camera(&mut self) {
        let camera = self.camera;
        let before = self.history.index();
        let result = self.write_session(move |session, _| {
            session.set_offset(camera.offset)?;
            session.set_scale(camera.scale)
        });
        if let Err(e) = result {
            self.report(&e);
        }
        if self.history.index() != before {
            self.hooks.on_history_changed(self.history.index());
        }
    }

    // --- Elements ---

    /// Create and register an element.
    pub fn create_element(
        &mut self,
        tag: &str,
        position: Point,
        size: Size,
        classification: &str,
        saveable: bool,
    ) -> ElementId {
        let id = self.registry.create(tag, position, size, classification, saveable);
        self.flush_registry_events();
        id
    }

    /// Register an existing element. Returns false if it is already registered.
    pub fn add_element(&mut self, element: TrackedElement) -> bool {
        let added = self.registry.add(element);
        self.flush_registry_events();
        added
    }

    pub fn remove_element(&mut self, id: ElementId) -> Option<TrackedElement> {
        let removed = self.registry.remove(id);
        self.flush_registry_events();
        removed
    }

    pub fn update_element(&mut self, id: ElementId, f: impl FnOnce(&mut TrackedElement)) -> bool {
        let updated = self.registry.update(id, f);
        self.flush_registry_events();
        updated
    }

    /// Remove all elements, or only the saveable ones.
    pub fn clear_elements(&mut self, only_saveable: bool) {
        self.registry.clear(only_saveable);
        self.flush_registry_events();
    }

    pub fn element(&self, id: ElementId) -> Option<&TrackedElement> {
        self.registry.get(id)
    }

    /// Elements in insertion order.
    pub fn elements(&self) -> impl Iterator<Item = &TrackedElement> {
        self.registry.iter()
    }

    /// Place a named, non-saveable marker, creating it on first use.
    pub fn debug_marker(&mut self, name: &str, local: Point) -> ElementId {
        if let Some(&id) = self.debug_markers.get(name) {
            if self.update_element(id, |marker| marker.position = local) {
                return id;
            }
        }
        let id = self.create_element("div", local, DEBUG_MARKER_SIZE, "debug", false);
        self.debug_markers.insert(name.to_string(), id);
        id
    }

    fn flush_registry_events(&mut self) {
        for event in self.registry.drain_events() {
            match event {
                RegistryEvent::Created(id) => {
                    if let Some(element) = self.registry.get(id) {
                        self.hooks.on_element_create(element);
                    }
                }
                RegistryEvent::Updated(id) => {
                    if let Some(element) = self.registry.get(id) {
                        self.hooks.on_element_update(element);
                    }
                }
                RegistryEvent::Deleted(element) => self.hooks.on_element_delete(&element),
            }
        }
    }

    // --- Persistence ---

    /// Open the history store and start using it.
    pub async fn attach_store(&mut self, store: Box<dyn ObjectStore>) -> Result<(), HistoryError> {
        if let Err(e) = store.open().await {
            log::error!("Failed to open history store for {}: {}", self.name(), e);
            return Err(e.into());
        }
        log::info!("History store for {} opened", self.name());
        self.objects = Some(store);
        self.hooks.on_initialized();
        self.hooks.on_history_changed(self.history.index());
        Ok(())
    }

    /// Snapshot all saveable elements as a new history entry.
    ///
    /// Any redo branch is discarded. Returns the new index, or `None` if a
    /// load is in progress.
    pub async fn save(&mut self) -> Result<Option<RecordKey>, HistoryError> {
        self.require_store()?;
        self.flush_evictions().await;

        let previous = self.history.index();
        let Some(key) = self.history.begin_save() else {
            return Ok(None);
        };
        if let Err(e) = self.write_snapshot(key).await {
            self.history.abort_save(previous);
            self.report(&e);
            // Keep the persisted window in step with any evictions made while trying.
            self.commit_history()?;
            return Err(e);
        }
        self.history.finish_save();
        log::debug!("Saved snapshot {} of {}", key, self.name());
        self.commit_history()?;
        Ok(Some(key))
    }

    /// Step back one snapshot. A no-op at the oldest retained snapshot.
    pub async fn undo(&mut self) -> Result<(), HistoryError> {
        self.require_store()?;
        if self.history.step_back().is_none() {
            return Ok(());
        }
        self.commit_history()?;
        self.load(None).await
    }

    /// Step forward one snapshot. A no-op at the newest snapshot.
    pub async fn redo(&mut self) -> Result<(), HistoryError> {
        self.require_store()?;
        if self.history.step_forward().is_none() {
            return Ok(());
        }
        self.commit_history()?;
        self.load(None).await
    }

    pub async fn apply(&mut self, command: HistoryCommand) -> Result<(), HistoryError> {
        match command {
            HistoryCommand::Undo => self.undo().await,
            HistoryCommand::Redo => self.redo().await,
        }
    }

    /// Replace the saveable elements with a snapshot.
    ///
    /// Without `data`, the snapshot at the current index is read from the
    /// store; if none is stored there this is a no-op. The registry is only
    /// touched once the snapshot has been decoded.
    pub async fn load(&mut self, data: Option<Vec<u8>>) -> Result<(), HistoryError> {
        let bytes = match data {
            Some(bytes) => bytes,
            None => {
                self.require_store()?;
                self.flush_evictions().await;
                let key = self.history.index().cur;
                match self.read_snapshot(key).await? {
                    Some(bytes) => bytes,
                    None => {
                        log::debug!("No snapshot stored at {} for {}", key, self.name());
                        return Ok(());
                    }
                }
            }
        };

        let _loading = self.history.begin_load();
        let json = self.compressor.decompress(&bytes).await.inspect_err(|e| {
            log::error!("Failed to decompress snapshot: {}", e);
        })?;
        let records = deserialize_records(&json).map_err(|e| {
            log::error!("Failed to parse snapshot: {}", e);
            StorageError::Serialization(e.to_string())
        })?;

        self.registry.clear(true);
        for record in &records {
            self.registry.restore(record);
        }
        self.flush_registry_events();
        log::debug!("Loaded {} elements into {}", records.len(), self.name());
        Ok(())
    }

    /// Destroy all history and persisted state for this instance and return
    /// to the default camera.
    ///
    /// Does nothing unless [`ViewportHooks::confirm_reset`] agrees. Returns
    /// whether the reset ran.
    pub async fn reset(&mut self) -> Result<bool, HistoryError> {
        if !self.hooks.confirm_reset() {
            return Ok(false);
        }
        log::warn!("Resetting map {}", self.name());

        self.session.clear()?;
        if let Some(store) = self.objects.as_deref() {
            store.wipe().await?;
        }

        self.history.reset();
        self.clear_elements(false);
        self.debug_markers.clear();
        self.gestures = GestureController::new();
        self.touches = TouchTracker::new();
        self.camera = Camera::with_defaults(&self.config);

        self.commit_history()?;
        self.camera_changed();
        Ok(true)
    }

    fn require_store(&self) -> Result<(), HistoryError> {
        if self.objects.is_none() {
            log::error!("History store for {} isn't open yet, wait for on_initialized", self.name());
            return Err(HistoryError::StoreUnavailable);
        }
        Ok(())
    }

    async fn read_snapshot(&self, key: RecordKey) -> Result<Option<Vec<u8>>, HistoryError> {
        let store = self.objects.as_deref().ok_or(HistoryError::StoreUnavailable)?;
        store.get(key).await.map_err(|e| {
            log::error!("Failed to read snapshot {}: {}", key, e);
            e.into()
        })
    }

    /// Serialize, compress and store the saveable elements under `key`,
    /// evicting old snapshots while the store is full.
    async fn write_snapshot(&mut self, key: RecordKey) -> Result<(), HistoryError> {
        let json = serialize_records(&self.registry.snapshot())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let bytes = self.compressor.compress(&json).await?;

        loop {
            let store = self.objects.as_deref().ok_or(HistoryError::StoreUnavailable)?;
            let result = store.put(key, bytes.clone()).await;
            match result {
                Ok(()) => return Ok(()),
                Err(StorageError::QuotaExceeded(what)) => {
                    log::warn!("History store full writing {}, evicting oldest snapshot", what);
                    self.history.evict_oldest()?;
                    self.flush_evictions().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Delete records of snapshots evicted from the history window.
    async fn flush_evictions(&mut self) {
        let Some(store) = self.objects.as_deref() else {
            return;
        };
        for key in self.history.take_pending_evictions() {
            if let Err(e) = store.delete(key).await {
                log::warn!("Failed to delete evicted snapshot {}: {}", key, e);
            }
        }
    }

    /// Persist the history window and tell the host about it.
    fn commit_history(&mut self) -> Result<(), HistoryError> {
        let result = self.write_session(|session, index| session.set_history_index(index));
        self.hooks.on_history_changed(self.history.index());
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    /// Run a scalar-store write, evicting old snapshots while the store is full.
    ///
    /// When anything was evicted, the new history window is written too.
    fn write_session(
        &mut self,
        mut write: impl FnMut(&mut SessionStore<S>, &HistoryIndex) -> StorageResult<()>,
    ) -> Result<(), HistoryError> {
        let mut evicted = false;
        loop {
            let index = self.history.index();
            let mut result = write(&mut self.session, &index);
            if evicted && result.is_ok() {
                result = self.session.set_history_index(&index);
            }
            match result {
                Ok(()) => return Ok(()),
                Err(StorageError::QuotaExceeded(what)) => {
                    log::warn!("Scalar store full writing {}, evicting oldest snapshot", what);
                    self.history.evict_oldest()?;
                    evicted = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn report(&mut self, error: &HistoryError) {
        log::error!("Unable to save {}: {}", self.name(), error);
        self.hooks.on_save_failed(error);
    }
}
