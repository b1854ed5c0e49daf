use super::model::ContentKind;
use crate::common::error::LifecycleError;
use mime::Mime;

const GIB: u64 = 1024 * 1024 * 1024;
const MIB: u64 = 1024 * 1024;

/// Per-kind acceptance rules for uploads. Every kind goes through the same
/// intake path; only this table differs.
#[derive(Debug, Clone, Copy)]
pub struct IntakePolicy {
    pub kind: ContentKind,
    pub allowed_types: &'static [&'static str],
    pub max_bytes: u64,
    pub requires_file: bool,
}

const VIDEO: IntakePolicy = IntakePolicy {
    kind: ContentKind::Video,
    allowed_types: &[
        "video/mp4",
        "video/quicktime",
        "video/x-msvideo",
        "video/x-matroska",
        "video/3gpp",
    ],
    max_bytes: 20 * GIB,
    requires_file: true,
};

const PICTURE: IntakePolicy = IntakePolicy {
    kind: ContentKind::Picture,
    allowed_types: &["image/jpeg", "image/png", "image/gif", "image/webp"],
    max_bytes: 20 * MIB,
    requires_file: true,
};

const TEXT: IntakePolicy = IntakePolicy {
    kind: ContentKind::Text,
    allowed_types: &[],
    max_bytes: 0,
    requires_file: false,
};

impl IntakePolicy {
    /// Live streams are opened through a live session, never uploaded.
    pub fn for_kind(kind: ContentKind) -> Option<&'static IntakePolicy> {
        match kind {
            ContentKind::Video => Some(&VIDEO),
            ContentKind::Picture => Some(&PICTURE),
            ContentKind::Text => Some(&TEXT),
            ContentKind::LiveStream => None,
        }
    }

    pub fn check(
        &self,
        mime_type: Option<&str>,
        size_bytes: Option<u64>,
    ) -> Result<(), LifecycleError> {
        if !self.requires_file {
            return match mime_type {
                None => Ok(()),
                Some(_) => Err(LifecycleError::Rejected(format!(
                    "{} content takes no file",
                    self.kind
                ))),
            };
        }

        let raw = mime_type.ok_or_else(|| {
            LifecycleError::Rejected(format!("{} upload requires a content type", self.kind))
        })?;
        let parsed: Mime = raw
            .parse()
            .map_err(|_| LifecycleError::Rejected(format!("malformed content type '{}'", raw)))?;

        if !self.allowed_types.contains(&parsed.essence_str()) {
            return Err(LifecycleError::Rejected(format!(
                "content type '{}' is not accepted for {}",
                parsed.essence_str(),
                self.kind
            )));
        }

        match size_bytes {
            Some(0) => Err(LifecycleError::Rejected("empty upload".to_string())),
            Some(size) if size > self.max_bytes => Err(LifecycleError::Rejected(format!(
                "upload of {} bytes exceeds the {} limit of {} bytes",
                size, self.kind, self.max_bytes
            ))),
            _ => Ok(()),
        }
    }
}
