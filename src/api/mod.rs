// SPDX-License-Identifier: MPL-2.0

mod client;
mod types;

pub use client::{Params, RemoteClient, RemoteError, RestClient};
pub use types::{DateRange, Person, Post, ReaderTag, ReaderUser};
