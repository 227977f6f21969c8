//! Parse mode conversions for EPG sources

use crate::models::{EpgSource, ParseMode};

impl EpgSource {
    /// Whether the source takes part in unattended runs
    pub fn is_scheduled(&self) -> bool {
        !self.hand_only
    }
}

impl From<i64> for ParseMode {
    fn from(code: i64) -> Self {
        match code {
            0 => ParseMode::Xmltv,
            1 => ParseMode::A4on,
            other => ParseMode::Unknown(other),
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Xmltv => write!(f, "xmltv"),
            ParseMode::A4on => write!(f, "a4on"),
            ParseMode::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_codes() {
        assert_eq!(ParseMode::from(0), ParseMode::Xmltv);
        assert_eq!(ParseMode::from(1), ParseMode::A4on);
        assert_eq!(ParseMode::from(7), ParseMode::Unknown(7));
    }

    #[test]
    fn test_parse_mode_display() {
        assert_eq!(ParseMode::Xmltv.to_string(), "xmltv");
        assert_eq!(ParseMode::A4on.to_string(), "a4on");
        assert_eq!(ParseMode::Unknown(7).to_string(), "unknown(7)");
    }

    #[test]
    fn test_hand_only_sources_are_not_scheduled() {
        let mut source = EpgSource {
            id: 1,
            name: "main".to_string(),
            parse_mode: ParseMode::Xmltv,
            local_file: "/tmp/feed.xml".to_string(),
            hand_only: false,
        };
        assert!(source.is_scheduled());

        source.hand_only = true;
        assert!(!source.is_scheduled());
    }
}
