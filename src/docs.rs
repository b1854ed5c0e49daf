use crate::modules::content::dto::*;
use crate::modules::content::lifecycle::ProcessingOutcome;
use crate::modules::content::model::{
    ContentItem, ContentKind, LiveStatus, ProcessingOutputs, TranscodingStatus,
};
use crate::modules::presence::dto::*;
use crate::modules::stream::dto::*;
use crate::modules::stream::prober::ProbeReport;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::content::handler::register_upload,
        crate::modules::content::handler::get_content,
        crate::modules::content::handler::upload_complete,
        crate::modules::content::handler::processing_callback,
        crate::modules::stream::handler::create_live_session,
        crate::modules::stream::handler::lookup_stream,
        crate::modules::stream::handler::publish_start,
        crate::modules::stream::handler::publish_done,
        crate::modules::stream::handler::probe,
        crate::modules::presence::handler::join,
        crate::modules::presence::handler::heartbeat,
        crate::modules::presence::handler::leave,
        crate::modules::presence::handler::viewer_count,
    ),
    components(
        schemas(
            ContentItem, ContentKind, TranscodingStatus, LiveStatus,
            ProcessingOutcome, ProcessingOutputs,
            RegisterUploadRequest, UploadCompleteRequest, ProcessingSignalRequest,
            TransitionResponse,
            CreateLiveSessionRequest, LiveSession, StreamInfo, PublishHook,
            ProbeRequest, ProbeReport,
            PresenceAck, PresenceUpdate, ViewerCount,
        )
    ),
    tags(
        (name = "Content", description = "Upload intake and transcoding lifecycle"),
        (name = "Streams", description = "Live sessions and media server hooks"),
        (name = "Presence", description = "Viewer presence and counts")
    )
)]
pub struct ApiDoc;
