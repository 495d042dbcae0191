pub mod fanout;
pub mod webpush;

pub use fanout::{FanoutReport, PushFanout, PushPayload};
pub use webpush::{DeliveryStatus, PushTransport, WebPushTransport};
