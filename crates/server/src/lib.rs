//! Tool server exposing the CODESYS project tools over a line-delimited JSON
//! stream.

pub mod cli;
pub mod dispatch;
pub mod error;
pub mod stdio;
