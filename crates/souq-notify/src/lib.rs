pub mod email;
pub mod fanout;
pub mod render;

pub use fanout::NotificationFanout;
