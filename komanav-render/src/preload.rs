use tracing::{debug, trace};

use komanav_core::Panel;

use crate::buffer::RenderBuffer;
use crate::gateway::{DocumentHost, RenderGateway};

/// A panel rendered ahead of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadEntry {
    pub page: u32,
    /// 1-based panel index within `page`.
    pub panel_index: usize,
    pub image: RenderBuffer,
}

/// Single-slot cache holding the next panel on the current page.
///
/// A stored entry is only ever handed out for the exact `(page, index)` it
/// was rendered for; any other request discards it.
#[derive(Debug, Default)]
pub struct PreloadCache {
    slot: Option<PreloadEntry>,
}

impl PreloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// The `(page, index)` currently held, if any.
    pub fn slot_index(&self) -> Option<(u32, usize)> {
        self.slot.as_ref().map(|e| (e.page, e.panel_index))
    }

    pub fn invalidate(&mut self) {
        if let Some(entry) = self.slot.take() {
            trace!(page = entry.page, index = entry.panel_index, "Preload discarded");
        }
    }

    pub fn store(&mut self, entry: PreloadEntry) {
        self.slot = Some(entry);
    }

    /// Take the stored image if it was rendered for `(page, index)`.
    ///
    /// On a mismatch the slot is emptied and `None` is returned.
    pub fn consume(&mut self, page: u32, index: usize) -> Option<RenderBuffer> {
        match self.slot.take() {
            Some(entry) if entry.page == page && entry.panel_index == index => {
                Some(entry.image)
            }
            Some(entry) => {
                debug!(
                    held_page = entry.page,
                    held_index = entry.panel_index,
                    page,
                    index,
                    "Preload mismatch"
                );
                None
            }
            None => None,
        }
    }

    /// Render `panel` at `(page, index)` into the slot.
    ///
    /// On failure the slot is left empty and `false` is returned.
    pub fn populate<H: DocumentHost + ?Sized>(
        &mut self,
        gateway: &RenderGateway,
        host: &mut H,
        page: u32,
        index: usize,
        panel: &Panel,
    ) -> bool {
        self.slot = None;
        match gateway.render_panel(host, page, panel) {
            Ok(image) => {
                debug!(page, index, "Preloaded panel");
                self.store(PreloadEntry {
                    page,
                    panel_index: index,
                    image,
                });
                true
            }
            Err(e) => {
                debug!(page, index, error = %e, "Preload render failed");
                false
            }
        }
    }
}
