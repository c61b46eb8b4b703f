//! Interaction layer for a portfolio page: CV download feedback, a validated
//! contact form that opens a prefilled mail, the work-experience list, the
//! dropdown navigation menu and scroll-driven header styling.
//!
//! Controllers talk to the page only through the [`dom::Dom`] trait. The
//! in-memory [`dom::memory::MemoryDom`] backs the tests; the `web` feature
//! adds a `web-sys` backend and a `boot` entry point for the browser.

pub mod config;
pub mod contact;
pub mod controller;
pub mod dom;
pub mod download;
pub mod error;
pub mod experience;
pub mod header;
pub mod menu;
pub mod page;
pub mod util;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use controller::Controller;
pub use dom::{Dom, Event, EventOutcome};
pub use error::{ConfigError, LoadError};
pub use page::Page;
