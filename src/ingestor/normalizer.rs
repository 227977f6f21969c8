use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::mapper::IdentifierMapper;
use super::rating::resolve_rating;
use super::xmltv_parser::FeedNode;
use crate::config::IngestionConfig;
use crate::errors::{IngestError, IngestResult};
use crate::models::{ChannelDateBucket, ProgramEvent};
use crate::utils::{clean_text, local_to_utc, parse_feed_timestamp};

/// Character caps applied to stored text.
#[derive(Debug, Clone, Copy)]
pub struct TextLimits {
    pub max_text_length: usize,
    pub max_description_length: usize,
}

impl From<&IngestionConfig> for TextLimits {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            max_text_length: config.max_text_length,
            max_description_length: config.max_description_length,
        }
    }
}

impl Default for TextLimits {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

/// Every event of one source feed, plus the buckets they fall into.
#[derive(Debug, Default)]
pub struct NormalizedFeed {
    pub events: Vec<ProgramEvent>,
    pub buckets: BTreeSet<ChannelDateBucket>,
    pub unmapped: usize,
    pub malformed: usize,
    /// Events replaced by a later programme on the same channel and start.
    pub duplicates: usize,
}

pub struct EventNormalizer<'a> {
    mapper: &'a IdentifierMapper,
    utc_offset_seconds: i32,
    limits: TextLimits,
}

impl<'a> EventNormalizer<'a> {
    pub fn new(mapper: &'a IdentifierMapper, utc_offset_seconds: i32, limits: TextLimits) -> Self {
        Self {
            mapper,
            utc_offset_seconds,
            limits,
        }
    }

    /// Normalize a whole feed. Unmapped channels are dropped silently and
    /// events with malformed timestamps are dropped with a warning.
    ///
    /// At most one event is kept per channel and local start; the last
    /// programme in feed order wins.
    pub fn normalize_all(&self, nodes: &[FeedNode]) -> NormalizedFeed {
        let mut feed = NormalizedFeed::default();
        let mut positions: HashMap<(i64, NaiveDateTime), usize> = HashMap::new();

        for node in nodes {
            match self.normalize(node) {
                Ok(Some(event)) => {
                    feed.buckets.insert(event.bucket());
                    let key = (event.channel_id, event.local_start);
                    match positions.get(&key).copied() {
                        Some(index) => {
                            debug!("Replacing duplicate programme: {}", event.summary());
                            feed.events[index] = event;
                            feed.duplicates += 1;
                        }
                        None => {
                            positions.insert(key, feed.events.len());
                            feed.events.push(event);
                        }
                    }
                }
                Ok(None) => feed.unmapped += 1,
                Err(e) => {
                    warn!(
                        "Skipping programme on channel '{}': {}",
                        node.attribute("channel").unwrap_or(""),
                        e
                    );
                    feed.malformed += 1;
                }
            }
        }

        feed
    }

    /// Normalize one programme; `Ok(None)` means its channel is not mapped.
    pub fn normalize(&self, node: &FeedNode) -> IngestResult<Option<ProgramEvent>> {
        let code = node.attribute("channel").unwrap_or("");
        let Some(channel_id) = self.mapper.resolve_channel(code) else {
            debug!("No channel mapping for code '{}'", code);
            return Ok(None);
        };

        let local_start = parse_timestamp_attribute(node, "start")?;
        let local_stop = parse_timestamp_attribute(node, "stop")?;

        let genres = node.text("category");
        let broadcast_genre = node
            .text("dvbgenre")
            .or_else(|| node.text("dvbganre"))
            .map(str::to_string)
            .or_else(|| {
                genres
                    .and_then(|label| self.mapper.resolve_genre(label))
                    .map(|id| id.to_string())
            });

        let rating = resolve_rating(node);
        let text = |value: Option<&str>| clean_text(value, self.limits.max_text_length);

        Ok(Some(ProgramEvent {
            channel_id,
            title: text(rating.title.as_deref()),
            description: clean_text(
                compose_description(node.text("sub-title"), node.text("desc")).as_deref(),
                self.limits.max_description_length,
            ),
            local_start,
            local_stop,
            utc_start: local_to_utc(local_start, self.utc_offset_seconds),
            utc_stop: local_to_utc(local_stop, self.utc_offset_seconds),
            actors: text(credit_text(node, "actors", "actor").as_deref()),
            country: text(node.text("country")),
            create_year: text(create_year(node)),
            directed: text(credit_text(node, "directed", "director").as_deref()),
            genres: text(genres),
            broadcast_genre: text(broadcast_genre.as_deref()),
            min_age: rating.min_age,
        }))
    }
}

fn parse_timestamp_attribute(node: &FeedNode, name: &str) -> IngestResult<NaiveDateTime> {
    match node.attribute(name) {
        Some(value) => parse_feed_timestamp(value),
        None => Err(IngestError::malformed_timestamp(
            "",
            format!("missing '{}' attribute", name),
        )),
    }
}

/// Subtitle first, then synopsis, joined by ". " when both are present.
fn compose_description(subtitle: Option<&str>, synopsis: Option<&str>) -> Option<String> {
    match (subtitle, synopsis) {
        (Some(sub), Some(desc)) => Some(format!("{}. {}", sub, desc)),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

/// A flat legacy field, else the matching `<credits>` children joined by ", ".
fn credit_text(node: &FeedNode, field: &str, credit_role: &str) -> Option<String> {
    if let Some(text) = node.text(field) {
        return Some(text.to_string());
    }

    let names = node.field("credits")?.get(credit_role)?.scalars();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// Legacy `<year>`, else the leading year of a standard `<date>`.
fn create_year(node: &FeedNode) -> Option<&str> {
    node.text("year").or_else(|| {
        node.text("date")
            .filter(|date| date.len() >= 4 && date.as_bytes()[..4].iter().all(u8::is_ascii_digit))
            .map(|date| &date[..4])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestor::mapper::{ChannelMap, GenreMap};
    use crate::ingestor::xmltv_parser::parse_xmltv;
    use chrono::NaiveDate;

    fn mapper() -> IdentifierMapper {
        IdentifierMapper {
            channels: ChannelMap::from_rows(vec![("one".to_string(), 1), ("uno".to_string(), 1)]),
            genres: GenreMap::from_rows(vec![("Drama".to_string(), 5)]),
        }
    }

    fn nodes(programmes: &str) -> Vec<FeedNode> {
        parse_xmltv(format!("<tv>{}</tv>", programmes).as_bytes()).unwrap()
    }

    #[test]
    fn test_normalize_full_event() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 3 * 3600, TextLimits::default());
        let node = &nodes(
            r#"<programme channel="one" start="20240115020000 +0000" stop="20240115033000 +0000">
                <title>Film</title><sub-title>Part 1</sub-title><desc>Plot</desc>
                <actors>Ann, Bob</actors><country>FR</country><year>1999</year>
                <directed>Cid</directed><category>Drama</category><dvbgenre>16</dvbgenre>
                <parental>12+</parental>
            </programme>"#,
        )[0];

        let event = normalizer.normalize(node).unwrap().unwrap();
        assert_eq!(event.channel_id, 1);
        assert_eq!(event.title.as_deref(), Some("Film"));
        assert_eq!(event.description.as_deref(), Some("Part 1. Plot"));
        assert_eq!(event.local_start.to_string(), "2024-01-15 02:00:00");
        assert_eq!(event.utc_start.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-14 23:00:00");
        assert_eq!(event.utc_stop.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-15 00:30:00");
        assert_eq!(event.actors.as_deref(), Some("Ann, Bob"));
        assert_eq!(event.country.as_deref(), Some("FR"));
        assert_eq!(event.create_year.as_deref(), Some("1999"));
        assert_eq!(event.directed.as_deref(), Some("Cid"));
        assert_eq!(event.genres.as_deref(), Some("Drama"));
        assert_eq!(event.broadcast_genre.as_deref(), Some("16"));
        assert_eq!(event.min_age, Some(12));
        assert_eq!(
            event.bucket(),
            ChannelDateBucket {
                channel_id: 1,
                date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
            }
        );
    }

    #[test]
    fn test_genre_fallback_through_mapping() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 0, TextLimits::default());
        let feed = normalizer.normalize_all(&nodes(
            r#"<programme channel="one" start="202401150200" stop="202401150300"><category>Drama</category></programme>
               <programme channel="one" start="202401150300" stop="202401150400"><category>Sport</category></programme>
               <programme channel="one" start="202401150400" stop="202401150500"><category>Drama</category><dvbganre>7</dvbganre></programme>"#,
        ));

        let genres: Vec<_> = feed.events.iter().map(|e| e.broadcast_genre.as_deref()).collect();
        assert_eq!(genres, vec![Some("5"), None, Some("7")]);
    }

    #[test]
    fn test_unmapped_and_malformed_are_dropped() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 0, TextLimits::default());
        let feed = normalizer.normalize_all(&nodes(
            r#"<programme channel="nope" start="202401150200" stop="202401150300"/>
               <programme start="202401150200" stop="202401150300"/>
               <programme channel="one" start="15.01.2024 02:00" stop="202401150300"/>
               <programme channel="one" start="202401150200"/>
               <programme channel="uno" start="202401160200" stop="202401160300"/>"#,
        ));

        assert_eq!(feed.events.len(), 1);
        assert_eq!(feed.unmapped, 2);
        assert_eq!(feed.malformed, 2);
        assert_eq!(feed.buckets.len(), 1);
    }

    #[test]
    fn test_same_channel_and_start_keeps_last_programme() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 0, TextLimits::default());
        let feed = normalizer.normalize_all(&nodes(
            r#"<programme channel="one" start="202401150200" stop="202401150300"><title>First</title></programme>
               <programme channel="one" start="202401150300" stop="202401150400"><title>Next</title></programme>
               <programme channel="uno" start="20240115020000 +0000" stop="202401150300"><title>Second</title></programme>"#,
        ));

        let titles: Vec<_> = feed.events.iter().map(|e| e.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Second"), Some("Next")]);
        assert_eq!(feed.duplicates, 1);
        assert_eq!(feed.buckets.len(), 1);
    }

    #[test]
    fn test_buckets_follow_local_start_date() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 3 * 3600, TextLimits::default());
        let feed = normalizer.normalize_all(&nodes(
            r#"<programme channel="one" start="202401152330" stop="202401160030"/>
               <programme channel="one" start="202401160030" stop="202401160130"/>
               <programme channel="uno" start="202401160130" stop="202401160230"/>"#,
        ));

        let dates: Vec<_> = feed.buckets.iter().map(|b| b.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-15", "2024-01-16"]);
    }

    #[test]
    fn test_description_composition() {
        assert_eq!(compose_description(Some("Sub"), Some("Desc")).as_deref(), Some("Sub. Desc"));
        assert_eq!(compose_description(Some("Sub"), None).as_deref(), Some("Sub"));
        assert_eq!(compose_description(None, Some("Desc")).as_deref(), Some("Desc"));
        assert_eq!(compose_description(None, None), None);
    }

    #[test]
    fn test_empty_fields_are_absent_and_text_is_capped() {
        let mapper = mapper();
        let limits = TextLimits {
            max_text_length: 5,
            max_description_length: 8,
        };
        let normalizer = EventNormalizer::new(&mapper, 0, limits);
        let node = &nodes(
            r#"<programme channel="one" start="202401150200" stop="202401150300">
                <title>Long title here</title><desc>A long synopsis</desc><country></country>
            </programme>"#,
        )[0];

        let event = normalizer.normalize(node).unwrap().unwrap();
        assert_eq!(event.title.as_deref(), Some("Long "));
        assert_eq!(event.description.as_deref(), Some("A long s"));
        assert_eq!(event.country, None);
        assert_eq!(event.actors, None);
        assert_eq!(event.min_age, None);
    }

    #[test]
    fn test_standard_xmltv_fallbacks() {
        let mapper = mapper();
        let normalizer = EventNormalizer::new(&mapper, 0, TextLimits::default());
        let node = &nodes(
            r#"<programme channel="one" start="202401150200" stop="202401150300">
                <title>Film</title><date>19990612</date>
                <credits><director>Cid</director><actor>Ann</actor><actor>Bob</actor></credits>
            </programme>"#,
        )[0];

        let event = normalizer.normalize(node).unwrap().unwrap();
        assert_eq!(event.create_year.as_deref(), Some("1999"));
        assert_eq!(event.actors.as_deref(), Some("Ann, Bob"));
        assert_eq!(event.directed.as_deref(), Some("Cid"));
    }
}
