// SPDX-License-Identifier: GPL-3.0-only
pub mod url_validator;

pub use url_validator::{parse_http_url, resolve_app_url, same_origin, validate_backend_url};
