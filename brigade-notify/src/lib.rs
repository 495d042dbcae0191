pub mod content;
pub mod dispatcher;
pub mod meta;

pub use content::{build_content, NotificationContent};
pub use dispatcher::NotificationDispatcher;
pub use meta::build_meta;
