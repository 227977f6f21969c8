pub mod text;
pub mod time;

pub use text::clean_text;
pub use time::{local_to_utc, parse_feed_timestamp};
