use crate::constants::NEW_EVENT_ID;
use crate::event::CalendarEvent;

/// Which event the editor shows, and the unsaved draft if any.
#[derive(Debug, Clone, Default)]
pub(crate) struct ModalState {
    pub active_event_id: Option<String>,
    pub hidden: bool,
    pub draft: Option<CalendarEvent>,
}

impl ModalState {
    pub fn open_existing(&mut self, event_id: &str) {
        self.active_event_id = Some(event_id.to_string());
        self.draft = None;
        self.hidden = false;
    }

    pub fn open_draft(&mut self, draft: CalendarEvent) {
        self.active_event_id = Some(NEW_EVENT_ID.to_string());
        self.draft = Some(draft);
        self.hidden = false;
    }

    pub fn close(&mut self) {
        self.active_event_id = None;
        self.draft = None;
    }

    /// Forget the draft; close the editor if it was showing it.
    pub fn discard_draft(&mut self) {
        self.draft = None;
        if self.is_active(NEW_EVENT_ID) {
            self.active_event_id = None;
        }
    }

    pub fn is_active(&self, event_id: &str) -> bool {
        self.active_event_id.as_deref() == Some(event_id)
    }

    pub fn is_open(&self) -> bool {
        !self.hidden && self.active_event_id.is_some()
    }
}
