//! Domain logic for driving the CODESYS scripting engine.
//!
//! [`scripting`] runs scripts and classifies their output, [`templates`]
//! loads and fills the bundled script templates, and [`tools`] combines both
//! into the project operations exposed to remote callers.

pub mod config;
pub mod error;
pub mod scripting;
pub mod templates;
pub mod tools;
