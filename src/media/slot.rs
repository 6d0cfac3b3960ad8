use std::sync::Mutex;

use tokio::sync::watch;

use super::types::LocalImage;

/// The two user-facing image inputs of a redesign attempt.
///
/// Slots store the raw selected file only; format normalization (including
/// HEIC conversion) is the server's job. Every mutation recomputes the
/// "both slots filled" flag, which the pipeline controller consumes as its
/// entry guard and UI layers observe through [`InputSlots::ready_changes`].
pub struct InputSlots {
    original: Mutex<Option<LocalImage>>,
    inspiration: Mutex<Option<LocalImage>>,
    ready: watch::Sender<bool>,
}

impl Default for InputSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSlots {
    #[must_use]
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            original: Mutex::new(None),
            inspiration: Mutex::new(None),
            ready,
        }
    }

    pub fn set_original(&self, image: LocalImage) {
        *self.original.lock().expect("slot lock poisoned") = Some(image);
        self.recompute_ready();
    }

    pub fn clear_original(&self) {
        *self.original.lock().expect("slot lock poisoned") = None;
        self.recompute_ready();
    }

    #[must_use]
    pub fn original(&self) -> Option<LocalImage> {
        self.original.lock().expect("slot lock poisoned").clone()
    }

    pub fn set_inspiration(&self, image: LocalImage) {
        *self.inspiration.lock().expect("slot lock poisoned") = Some(image);
        self.recompute_ready();
    }

    pub fn clear_inspiration(&self) {
        *self.inspiration.lock().expect("slot lock poisoned") = None;
        self.recompute_ready();
    }

    #[must_use]
    pub fn inspiration(&self) -> Option<LocalImage> {
        self.inspiration.lock().expect("slot lock poisoned").clone()
    }

    /// Both slots filled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Subscribe to readiness changes (UI projection).
    #[must_use]
    pub fn ready_changes(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }

    /// Snapshot both inputs if present.
    #[must_use]
    pub fn both(&self) -> Option<(LocalImage, LocalImage)> {
        let original = self.original()?;
        let inspiration = self.inspiration()?;
        Some((original, inspiration))
    }

    fn recompute_ready(&self) {
        let filled = self.original.lock().expect("slot lock poisoned").is_some()
            && self.inspiration.lock().expect("slot lock poisoned").is_some();
        self.ready.send_replace(filled);
    }
}
