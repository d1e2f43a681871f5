pub mod clock;
pub mod deletion;
pub mod error;
pub mod event;
pub mod photo;
pub mod stats;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use deletion::{
    DeletionDecision, DeletionRequest, DeletionRequestStatus, Requester, RequesterRole,
};
pub use error::TransitionError;
pub use event::PhotoEvent;
pub use photo::{
    DEFAULT_REJECTION_REASON, Dimensions, ModerationDecision, PhotoStatus, PhotoSubmission,
};
pub use stats::PhotoStats;
pub use types::{
    DELETION_REQUEST_ID_PREFIX, DeletionRequestId, PHOTO_ID_PREFIX, PhotoId, ShopId,
};
