//! Accept/reject pattern filter over device paths

use super::DeviceFilter;
use crate::devcache::Device;
use crate::error::{Result, VolmanError};
use ::regex::Regex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Accept,
    Reject,
}

/// Matches device paths against an ordered list of include/exclude patterns.
///
/// Each pattern is `a` (accept) or `r` (reject) followed by a delimited
/// regular expression, e.g. `a|/dev/loop.*|` or `r/.*/`. The first pattern
/// that matches decides; a device matching no pattern is accepted.
#[derive(Debug)]
pub struct RegexFilter {
    patterns: Vec<(Action, Regex)>,
}

impl RegexFilter {
    /// Compile a pattern list. An empty list is a construction error; the
    /// caller treats an absent config node as "skip this layer" instead.
    pub fn create(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Err(VolmanError::FilterConstruction(
                "devices/filter contains no patterns".to_string(),
            ));
        }

        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            compiled.push(Self::parse_pattern(raw)?);
        }

        Ok(RegexFilter { patterns: compiled })
    }

    fn parse_pattern(raw: &str) -> Result<(Action, Regex)> {
        let malformed = || {
            VolmanError::FilterConstruction(format!(
                "malformed filter pattern '{}' (expected a<delim>regex<delim> or r<delim>regex<delim>)",
                raw
            ))
        };

        let mut chars = raw.chars();
        let action_char = chars.next().ok_or_else(malformed)?;
        let action = match action_char {
            'a' => Action::Accept,
            'r' => Action::Reject,
            _ => return Err(malformed()),
        };
        let delim = chars.next().ok_or_else(malformed)?;

        let body = &raw[action_char.len_utf8() + delim.len_utf8()..];
        let end = body.rfind(delim).ok_or_else(malformed)?;
        let expr = &body[..end];

        let regex = Regex::new(expr).map_err(|source| VolmanError::FilterPattern {
            pattern: raw.to_string(),
            source,
        })?;

        Ok((action, regex))
    }
}

impl DeviceFilter for RegexFilter {
    fn passes(&mut self, device: &Device) -> bool {
        let path = device.path().to_string_lossy();
        for (action, regex) in &self.patterns {
            if regex.is_match(&path) {
                let accepted = *action == Action::Accept;
                if !accepted {
                    debug!(device = %path, pattern = %regex.as_str(), "device rejected by pattern");
                }
                return accepted;
            }
        }
        true
    }

    fn name(&self) -> &str {
        "regex"
    }
}
