//! Time template: formats snapshot paths and matches them per tier.
//!
//! A template is a strftime string of exactly four `/`-separated components,
//! year first and time-of-day last, e.g. `/%Y/%B/%-d/%H%MZ` which yields
//! `2024/March/14/0130Z`. Each tier's pattern matches the first
//! [`Tier::depth`] components of a relative snapshot path.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::RotateError;
use crate::types::Tier;

/// Compiled matcher for one tier.
#[derive(Debug, Clone)]
pub struct TierPattern {
    regex: Regex,
    depth: usize,
}

impl TierPattern {
    /// Number of path components a match has.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a path relative to the backup-set root matches exactly.
    pub fn is_match(&self, relative: &Path) -> bool {
        match slash_joined(relative) {
            Some(key) => self.regex.is_match(&key),
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeTemplate {
    source: String,
    /// `components.join("/")`, used for formatting and parsing.
    layout: String,
    /// `fillers[n]` completes a path of `n` components to a full layout.
    fillers: [String; 5],
    /// Indexed by `depth - 1`.
    patterns: [TierPattern; 4],
}

impl TimeTemplate {
    pub fn parse(template: &str) -> Result<Self, RotateError> {
        let invalid = |reason: String| RotateError::Template {
            template: template.to_string(),
            reason,
        };

        let trimmed = template.trim_matches('/');
        let components: Vec<&str> = trimmed.split('/').collect();
        if components.len() != 4 || components.iter().any(|c| c.is_empty()) {
            return Err(invalid(format!(
                "expected 4 non-empty components (year/month/day/time), found {}",
                components.len()
            )));
        }

        let fragments = components
            .iter()
            .map(|c| component_regex(c))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;

        let compile = |depth: usize| -> Result<TierPattern, RotateError> {
            let pattern = format!("^{}$", fragments[..depth].join("/"));
            let regex = Regex::new(&pattern).map_err(|e| invalid(e.to_string()))?;
            Ok(TierPattern { regex, depth })
        };
        let patterns = [compile(1)?, compile(2)?, compile(3)?, compile(4)?];

        let layout = components.join("/");
        let fill_instant = NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| invalid("filler date out of range".to_string()))?;
        let filler = |n: usize| -> String {
            if n >= components.len() {
                return String::new();
            }
            let rest = components[n..].join("/");
            format!("/{}", fill_instant.format(&rest))
        };
        let fillers = [filler(0), filler(1), filler(2), filler(3), filler(4)];

        let parsed = Self {
            source: template.to_string(),
            layout,
            fillers,
            patterns,
        };

        // The full layout must carry a date and a time down to minutes.
        let probe = fill_instant.and_utc();
        let formatted = parsed.format(probe);
        if parsed.parse_path(&formatted).is_err() || !parsed.matches(Tier::Initial, &formatted) {
            return Err(invalid(
                "template must encode year, month, day, hour and minute".to_string(),
            ));
        }

        Ok(parsed)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn pattern(&self, tier: Tier) -> &TierPattern {
        &self.patterns[tier.depth() - 1]
    }

    pub fn matches(&self, tier: Tier, relative: &Path) -> bool {
        self.pattern(tier).is_match(relative)
    }

    /// Relative snapshot path for `instant`.
    pub fn format(&self, instant: DateTime<Utc>) -> PathBuf {
        PathBuf::from(instant.format(&self.layout).to_string())
    }

    /// Read the timestamp a relative path of any tier encodes.
    ///
    /// Coarser paths resolve to the first instant of the period they name.
    pub fn parse_path(&self, relative: &Path) -> Result<DateTime<Utc>, RotateError> {
        let fail = |reason: String| RotateError::PathDate {
            path: relative.to_path_buf(),
            reason,
        };
        let key = slash_joined(relative).ok_or_else(|| fail("not a relative UTF-8 path".into()))?;
        let depth = key.split('/').count();
        if key.is_empty() || depth > 4 {
            return Err(fail(format!("expected 1 to 4 components, found {depth}")));
        }
        let full = format!("{key}{}", self.fillers[depth]);
        NaiveDateTime::parse_from_str(&full, &self.layout)
            .map(|naive| naive.and_utc())
            .map_err(|e| fail(e.to_string()))
    }
}

/// Join the normal components of `path` with `/`; `None` for anything else.
fn slash_joined(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::RootDir | Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Translate one template component into a regex fragment.
fn component_regex(component: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            continue;
        }
        let (unpadded, spec) = match chars.next() {
            Some('-') => (true, chars.next()),
            other => (false, other),
        };
        let fragment = match (spec, unpadded) {
            (Some('Y'), false) => "[0-9]{4}",
            (Some('y' | 'm' | 'd' | 'H' | 'M' | 'S'), false) => "[0-9]{2}",
            (Some('m' | 'd' | 'H' | 'M' | 'S'), true) => "[0-9]{1,2}",
            (Some('e'), false) => " ?[0-9]{1,2}",
            (Some('j'), false) => "[0-9]{3}",
            (Some('B'), false) => "[A-Za-z]+",
            (Some('b'), false) => "[A-Za-z]{3}",
            (Some('%'), false) => "%",
            (Some(other), _) => {
                return Err(format!(
                    "unsupported specifier '%{}{other}'",
                    if unpadded { "-" } else { "" }
                ))
            }
            (None, _) => return Err("dangling '%' at end of component".to_string()),
        };
        out.push_str(fragment);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn default_template() -> TimeTemplate {
        TimeTemplate::parse(crate::settings::DEFAULT_TIME_TEMPLATE).expect("template")
    }

    #[test]
    fn formats_nested_path() {
        let t = default_template();
        let instant = Utc.with_ymd_and_hms(2024, 3, 14, 1, 30, 59).unwrap();
        assert_eq!(t.format(instant), PathBuf::from("2024/March/14/0130Z"));
    }

    #[test]
    fn tier_patterns_match_only_their_depth() {
        let t = default_template();
        assert!(t.matches(Tier::Year, Path::new("2024")));
        assert!(!t.matches(Tier::Year, Path::new("2024/March")));
        assert!(t.matches(Tier::Month, Path::new("2024/March")));
        assert!(t.matches(Tier::Day, Path::new("2024/March/7")));
        assert!(t.matches(Tier::Initial, Path::new("2024/March/7/2359Z")));
        assert!(!t.matches(Tier::Initial, Path::new("2024/March/7/2359")));
    }

    #[test]
    fn pointer_and_working_dirs_never_match() {
        let t = default_template();
        for tier in Tier::DISCOVERY_ORDER {
            assert!(!t.matches(tier, Path::new("current")));
            assert!(!t.matches(tier, Path::new(".tmp")));
            assert!(!t.matches(tier, Path::new("current/2024")));
        }
    }

    #[test]
    fn coarse_paths_resolve_to_period_start() {
        let t = default_template();
        let year = t.parse_path(Path::new("2024")).expect("year");
        assert_eq!(year, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let month = t.parse_path(Path::new("2024/March")).expect("month");
        assert_eq!(month, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let day = t.parse_path(Path::new("2024/March/14")).expect("day");
        assert_eq!(day, Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn unsupported_specifier_is_rejected() {
        let err = TimeTemplate::parse("/%Y/%m/%d/%H%M%Q").unwrap_err();
        assert!(err.to_string().contains("%Q"), "got: {err}");
    }

    #[test]
    fn template_without_minutes_is_rejected() {
        assert!(TimeTemplate::parse("/%Y/%m/%d/%H").is_err());
    }
}
