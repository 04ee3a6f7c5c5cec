//! XML cue format (`<text start=".." dur="..">..</text>` elements).

use lazy_static::lazy_static;
use regex::Regex;

use super::time::parse_decimal_seconds;
use super::{collapse_whitespace, decode_entities, strip_tags, MIN_CUE_DURATION};
use crate::transcript::Segment;

/// Cue text at or below this many characters is noise (`♪`, `..`)
const MIN_TEXT_CHARS: usize = 2;

lazy_static! {
    static ref TEXT_ELEMENT: Regex = Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").unwrap();
    static ref START_ATTR: Regex = Regex::new(r#"\bstart\s*=\s*"([^"]*)""#).unwrap();
    static ref DUR_ATTR: Regex = Regex::new(r#"\bdur\s*=\s*"([^"]*)""#).unwrap();
}

/// Decode an XML cue payload into segments
pub fn parse(raw: &str) -> Vec<Segment> {
    TEXT_ELEMENT
        .captures_iter(raw)
        .filter_map(|caps| {
            let attrs = &caps[1];
            let start = parse_decimal_seconds(&START_ATTR.captures(attrs)?[1])?;
            let duration = parse_decimal_seconds(&DUR_ATTR.captures(attrs)?[1])?;
            if duration <= MIN_CUE_DURATION {
                return None;
            }

            // Caption markup arrives entity-encoded, so decode before stripping tags.
            let text = collapse_whitespace(&strip_tags(&decode_entities(&caps[2])));
            if text.chars().count() <= MIN_TEXT_CHARS {
                return None;
            }

            Segment::new(text, start, duration)
        })
        .collect()
}
