//! Browser automation for CoralIngest page visits.
//!
//! Listing pages assemble their content client-side, so a plain HTTP fetch
//! yields an empty shell. This crate drives a real Chromium over CDP and
//! exposes the rendered markup, with session identity (cookies, headers,
//! user agent) applied before each navigation.

pub mod cookies;
pub mod headers;
pub mod session;

pub use cookies::{Cookie, load_cookie_file, parse_cookie_string, parse_netscape_cookies};
pub use headers::{ACCEPT_LANGUAGE, USER_AGENT, default_headers, merge_headers, parse_header_flag};
pub use session::{PageVisit, Session, SessionConfig};
