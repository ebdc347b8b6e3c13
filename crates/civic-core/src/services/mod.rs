//! Service wiring shared by hosts

mod client;

pub use client::{CivicClient, Platform, Sources};
