//! Texture notifications.
//!
//! Two surfaces are provided:
//! - [`Observable`]: per-texture callback channels (loaded / error) that are cleared on disposal
//! - [`TextureEventBuffer`]: manager-wide events drained once per frame by the host

use std::fmt;

use crate::error::TextureError;
use crate::handle::TextureId;

/// Identifies a registered observer so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback<T> = Box<dyn FnMut(&T) + Send + 'static>;

/// A list of callbacks notified in registration order.
pub struct Observable<T: ?Sized> {
    observers: Vec<(ObserverId, Callback<T>)>,
    next_id: u64,
}

impl<T: ?Sized> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<T: ?Sized> Observable<T> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a callback.
    pub fn add(&mut self, callback: impl FnMut(&T) + Send + 'static) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    pub fn notify(&mut self, value: &T) {
        for (_, callback) in &mut self.observers {
            callback(value);
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Payload of the error channel: a message plus the underlying error, if any.
#[derive(Debug, Clone)]
pub struct TextureFailure {
    pub message: String,
    pub error: Option<TextureError>,
}

impl TextureFailure {
    pub fn new(message: impl Into<String>, error: Option<TextureError>) -> Self {
        Self {
            message: message.into(),
            error,
        }
    }
}

/// Events emitted by the texture manager.
#[derive(Debug, Clone)]
pub enum TextureEvent {
    /// A texture was registered.
    Created { texture: TextureId },

    /// A texture was flagged ready outside of a rebuild.
    Ready { texture: TextureId },

    /// A rebuild finished and the new handle is installed.
    Rebuilt {
        texture: TextureId,
        /// Whether the texture is ready after the rebuild.
        ready: bool,
    },

    /// A rebuild failed; the texture stays not ready.
    RebuildFailed { texture: TextureId, error: String },

    /// A descriptor's resources moved into another and the source was retired.
    Transferred { from: TextureId, into: TextureId },

    /// The last reference was disposed and the hardware handle freed.
    Released { texture: TextureId },
}

impl TextureEvent {
    /// The texture this event relates to. For transfers, the surviving one.
    pub fn texture(&self) -> TextureId {
        match self {
            TextureEvent::Created { texture }
            | TextureEvent::Ready { texture }
            | TextureEvent::Rebuilt { texture, .. }
            | TextureEvent::RebuildFailed { texture, .. }
            | TextureEvent::Released { texture } => *texture,
            TextureEvent::Transferred { into, .. } => *into,
        }
    }

    pub fn is_rebuilt(&self) -> bool {
        matches!(self, TextureEvent::Rebuilt { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TextureEvent::RebuildFailed { .. })
    }

    pub fn is_released(&self) -> bool {
        matches!(self, TextureEvent::Released { .. })
    }
}

/// A buffer of texture events that can be drained each frame.
#[derive(Debug, Default)]
pub struct TextureEventBuffer {
    events: Vec<TextureEvent>,
}

impl TextureEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: TextureEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = TextureEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
