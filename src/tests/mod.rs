//! Unit tests for the event channel modules.
//!
//! This module contains unit test files for the supervisor, routing table,
//! throttle, transport, event bus and notification channel.


pub mod event_bus_test;
pub mod supervisor_test;
