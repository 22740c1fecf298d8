//! Glob-style test name filter.

use regex::Regex;

/// Pattern selecting tests by name. `*` matches any run of characters and `?`
/// matches exactly one; everything else is literal.
#[derive(Debug, Clone)]
pub struct TestFilter {
    raw: String,
    regex: Regex,
}

impl TestFilter {
    /// Compile `raw`. Blank patterns mean "no filter" and yield `Ok(None)`.
    pub fn parse(raw: &str) -> Result<Option<Self>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        let mut translated = String::from("^");
        for ch in raw.chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                other => translated.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        translated.push('$');
        let regex = Regex::new(&translated).map_err(|err| format!("invalid pattern '{raw}': {err}"))?;
        Ok(Some(Self {
            raw: raw.to_string(),
            regex,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when either the test's own name or its full scoped name matches.
    pub fn matches(&self, name: &str, full_name: &str) -> bool {
        self.regex.is_match(name) || self.regex.is_match(full_name)
    }
}
