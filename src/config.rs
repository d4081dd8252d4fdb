// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "io.github.sethcottle.ReaderSync";
pub const APP_NAME: &str = "reader-sync";

/// REST API root every request path is joined onto
pub const DEFAULT_API_BASE: &str = "https://public-api.wordpress.com/rest/v1.1/";

/// Number of posts requested per feed page
pub const MAX_POSTS_TO_REQUEST: u32 = 20;

pub const DEFAULT_LOG_FILTER: &str = "info";
