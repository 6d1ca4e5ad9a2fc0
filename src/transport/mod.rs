//! Subscriber transports.
//!
//! The broadcaster only knows the `Subscriber` trait. This module provides
//! the reference TCP surface: every accepted connection is subscribed and
//! receives one JSON object per line.

mod tcp;

pub use tcp::{AlertServer, AlertServerConfig, AlertServerHandle, TcpSubscriber};
