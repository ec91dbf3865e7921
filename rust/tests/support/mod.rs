#![allow(dead_code)]

pub mod fakes;
pub mod helpers;

pub use fakes::{channel_entry, contact_entry, FakeConnection, FakeDirectory, FakeTransport};
pub use helpers::{
    channel_payload, dm_payload, history_message, wait_until, write_config, Collector,
};
