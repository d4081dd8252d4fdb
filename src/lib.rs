// SPDX-License-Identifier: MPL-2.0

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod people;
pub mod reader;
pub mod runtime;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::ActionError;
