//! Selected-record binding for detail panes

use resendforward_common::types::RecordId;
use resendforward_storage::Identified;
use tracing::debug;

/// Selected record, kept in step with the list it was picked from.
///
/// The tracked id may be seeded from the URL before any data has loaded.
/// Each refresh of the list either adopts the matching fresh record or clears
/// the selection.
#[derive(Debug, Clone)]
pub struct Selection<T> {
    tracked: Option<RecordId>,
    selected: Option<T>,
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self {
            tracked: None,
            selected: None,
        }
    }
}

impl<T: Identified + Clone> Selection<T> {
    /// Start tracking `seed` (e.g. the `eventId` URL parameter)
    pub fn seeded(seed: Option<RecordId>) -> Self {
        Self {
            tracked: seed.filter(|id| !id.is_empty()),
            selected: None,
        }
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_ref().map(|r| r.id())
    }

    pub fn tracked_id(&self) -> Option<&str> {
        self.tracked.as_deref()
    }

    pub fn select(&mut self, record: T) {
        self.tracked = Some(record.id().to_string());
        self.selected = Some(record);
    }

    /// Close the detail pane; the URL is left untouched
    pub fn close(&mut self) {
        self.tracked = None;
        self.selected = None;
    }

    /// Re-resolve against a freshly fetched list
    pub fn refresh(&mut self, records: &[T]) {
        let Some(id) = self.tracked.as_deref() else {
            return;
        };
        self.selected = records.iter().find(|r| r.id() == id).cloned();
        if self.selected.is_none() {
            debug!(id, "Selected record no longer in list, clearing selection");
            self.tracked = None;
        }
    }

    /// Clear the selection if it points at `id`
    pub fn clear_if(&mut self, id: &str) {
        if self.tracked.as_deref() == Some(id) {
            self.close();
        }
    }
}
