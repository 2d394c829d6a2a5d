//! Client-side core of the messaging surface: optimistic sends, the
//! conversation view, the notification badge and the server connections.

pub mod badge;
pub mod config;
pub mod conversation;
pub mod http;
pub mod realtime;
pub mod reconcile;
pub mod tracker;

pub use badge::{Badge, BadgePoller, unread_count};
pub use config::ClientConfig;
pub use conversation::{ClientEvent, Conversation, Effects};
pub use http::{ClientError, SouqClient};
pub use realtime::RealtimeClient;
pub use reconcile::{DayBucket, DayLabel, ViewState, group_by_day, reconcile};
pub use tracker::{Acceptance, DeliveryTracker, TrackError};
