pub mod constants;
pub mod url_utils;

pub use constants::*;
pub use url_utils::{dir_name_from_url, is_valid_url, normalize_url};
