// Listener protocol shared by every mutable entity

pub mod listener;
pub mod notification;

pub use listener::{ChangeRecorder, Listener, ListenerId, ListenerSet, Subscription};
pub use notification::{Change, ChangeExtra};
