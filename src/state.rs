use crate::modules::content::service::ContentService;
use crate::modules::presence::service::PresenceService;
use crate::modules::stream::service::LiveStreamService;

#[derive(Clone)]
pub struct AppState {
    pub content: ContentService,
    pub streams: LiveStreamService,
    pub presence: PresenceService,
}

impl AppState {
    pub fn new(
        content: ContentService,
        streams: LiveStreamService,
        presence: PresenceService,
    ) -> Self {
        Self {
            content,
            streams,
            presence,
        }
    }
}
