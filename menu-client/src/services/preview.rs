//! In-process registry of preview blobs for staged files.
//!
//! A [`PreviewHandle`] is move-only: releasing it consumes it, so a handle
//! can be released at most once. Handles dropped without release are leaks
//! and show up in [`PreviewRegistry::live_count`].

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const PREVIEW_SCHEME: &str = "preview://";

#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: Uuid,
}

impl PreviewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Renderable reference handed to the UI layer.
    pub fn url(&self) -> String {
        format!("{}{}", PREVIEW_SCHEME, self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    blobs: Arc<Mutex<HashMap<Uuid, Bytes>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<Uuid, Bytes>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn create(&self, data: Bytes) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.blobs().insert(id, data);
        PreviewHandle { id }
    }

    pub fn resolve(&self, id: &Uuid) -> Option<Bytes> {
        self.blobs().get(id).cloned()
    }

    /// Look up a blob by the `preview://` URL from [`PreviewHandle::url`].
    pub fn resolve_url(&self, url: &str) -> Option<Bytes> {
        let id = url.strip_prefix(PREVIEW_SCHEME)?.parse::<Uuid>().ok()?;
        self.resolve(&id)
    }

    /// Free the blob behind `handle`. Returns false if it was already gone.
    pub fn release(&self, handle: PreviewHandle) -> bool {
        let released = self.blobs().remove(&handle.id).is_some();
        if !released {
            tracing::warn!(preview_id = %handle.id, "Preview handle released twice");
        }
        released
    }

    pub fn live_count(&self) -> usize {
        self.blobs().len()
    }
}
