pub mod content;
pub mod record;

pub use content::{ChannelContent, ContentError};
pub use record::{
    Channel, NotificationRecord, NotificationRequest, NotificationStatus, Priority,
};
