//! Locale handling for timeline labels.
//!
//! Client supplied BCP 47 style tags (`en`, `de-DE`, `pt_br`) are normalized
//! and resolved to one of chrono's locales for date formatting. The first day
//! of the week used for weekly buckets is derived from the region.

use chrono::{NaiveDate, Weekday};

const FALLBACK: chrono::Locale = chrono::Locale::en_US;

/// Region used when a tag names only a language.
const DEFAULT_REGIONS: &[(&str, &str)] = &[
    ("cs", "CZ"),
    ("da", "DK"),
    ("de", "DE"),
    ("en", "US"),
    ("es", "ES"),
    ("fi", "FI"),
    ("fr", "FR"),
    ("he", "IL"),
    ("it", "IT"),
    ("ja", "JP"),
    ("ko", "KR"),
    ("nb", "NO"),
    ("nl", "NL"),
    ("pl", "PL"),
    ("pt", "PT"),
    ("ru", "RU"),
    ("sv", "SE"),
    ("uk", "UA"),
    ("zh", "CN"),
];

/// Regions whose calendars start the week on Sunday.
const SUNDAY_FIRST_REGIONS: &[&str] = &[
    "BR", "CA", "CN", "HK", "IL", "IN", "JP", "KR", "MX", "PH", "SA", "TW", "US", "ZA",
];

#[derive(Clone, Debug, PartialEq)]
pub struct Locale {
    tag: String,
    chrono_locale: chrono::Locale,
    week_start: Weekday,
}

impl Locale {
    /// Never fails: unknown languages format like `en-US` but keep their tag.
    pub fn parse(tag: &str) -> Self {
        let (language, region) = split_tag(tag);
        let region = region.or_else(|| {
            DEFAULT_REGIONS
                .iter()
                .find(|(lang, _)| *lang == language)
                .map(|(_, region)| region.to_string())
        });

        let chrono_locale = region
            .as_deref()
            .and_then(|region| resolve(&language, region))
            .unwrap_or(FALLBACK);

        let week_start = match region.as_deref() {
            Some(region) if SUNDAY_FIRST_REGIONS.contains(&region) => Weekday::Sun,
            Some(_) => Weekday::Mon,
            None if chrono_locale == FALLBACK => Weekday::Sun,
            None => Weekday::Mon,
        };

        let tag = match &region {
            Some(region) if tag.contains(['-', '_']) => format!("{language}-{region}"),
            _ => language,
        };

        Locale {
            tag,
            chrono_locale,
            week_start,
        }
    }

    /// Normalized tag, e.g. `de-DE` for `de_de`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Identifies what this locale renders: the chrono locale used for labels
    /// and the week start used for buckets. Tags that resolve the same way,
    /// such as `en` and `en-US` or any two unknown languages, share it.
    pub fn cache_tag(&self) -> String {
        format!("{:?}-{:?}", self.chrono_locale, self.week_start)
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn format(&self, date: NaiveDate, pattern: &str) -> String {
        date.format_localized(pattern, self.chrono_locale).to_string()
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::parse("en")
    }
}

fn split_tag(tag: &str) -> (String, Option<String>) {
    let mut parts = tag.trim().split(['-', '_']).filter(|part| !part.is_empty());
    let language = parts
        .next()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "en".to_string());
    let region = parts
        .find(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()))
        .map(str::to_ascii_uppercase);
    (language, region)
}

fn resolve(language: &str, region: &str) -> Option<chrono::Locale> {
    chrono::Locale::try_from(format!("{language}_{region}").as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tag_normalization() {
        assert_eq!(Locale::parse("en").tag(), "en");
        assert_eq!(Locale::parse("de_de").tag(), "de-DE");
        assert_eq!(Locale::parse(" pt-br ").tag(), "pt-BR");
        assert_eq!(Locale::parse("").tag(), "en");
    }

    #[test]
    fn test_week_start() {
        assert_eq!(Locale::parse("en").week_start(), Weekday::Sun);
        assert_eq!(Locale::parse("en-US").week_start(), Weekday::Sun);
        assert_eq!(Locale::parse("en-GB").week_start(), Weekday::Mon);
        assert_eq!(Locale::parse("de").week_start(), Weekday::Mon);
        assert_eq!(Locale::parse("ja").week_start(), Weekday::Sun);
        assert_eq!(Locale::parse("pt-BR").week_start(), Weekday::Sun);
    }

    #[test]
    fn test_localized_formatting() {
        let day = date(2024, 3, 5);
        assert_eq!(Locale::parse("en").format(day, "%b %Y"), "Mar 2024");
        assert_eq!(Locale::parse("de").format(day, "%B %Y"), "März 2024");
        assert_eq!(Locale::parse("fr-FR").format(day, "%-d %B"), "5 mars");
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let locale = Locale::parse("xx");
        assert_eq!(locale.tag(), "xx");
        assert_eq!(locale.format(date(2024, 1, 1), "%b"), "Jan");
    }

    #[test]
    fn test_cache_tag_follows_resolution() {
        assert_eq!(Locale::parse("xx").cache_tag(), Locale::parse("qq").cache_tag());
        assert_eq!(Locale::parse("xx").cache_tag(), Locale::parse("en").cache_tag());
        assert_eq!(Locale::parse("en").cache_tag(), Locale::parse("en_us").cache_tag());
        assert_ne!(Locale::parse("en").cache_tag(), Locale::parse("en-GB").cache_tag());
        assert_ne!(Locale::parse("en").cache_tag(), Locale::parse("de").cache_tag());
        assert_ne!(Locale::parse("de").cache_tag(), Locale::parse("de-AT").cache_tag());
    }
}
