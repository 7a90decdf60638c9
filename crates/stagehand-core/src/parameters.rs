#![forbid(unsafe_code)]

//! Program parameters parsed from the launch argument list.
//!
//! Every argument of the form `name=value` (with `=` after at least one
//! character) becomes a named parameter. Names are case-insensitive and stored
//! lower-cased. Everything else is joined with [`POSITIONAL_SEPARATOR`] and
//! stored under the reserved [`ARGS_KEY`].
//!
//! ```
//! use stagehand_core::parameters::Parameters;
//!
//! let params = Parameters::parse(["Width=800", "demo", "fast"]);
//! assert_eq!(params.get("WIDTH"), Some("800"));
//! assert_eq!(params.positional(), "demo\tfast");
//! ```

use std::collections::HashMap;

/// Reserved key holding unmatched positional arguments.
pub const ARGS_KEY: &str = "args";

/// Separator used to join positional arguments.
pub const POSITIONAL_SEPARATOR: char = '\t';

/// Case-insensitive parameter table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    table: HashMap<String, String>,
}

impl Parameters {
    /// Create an empty table (no positional entry).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a launch argument list.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = HashMap::new();
        let mut positional = String::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.find('=') {
                Some(idx) if idx > 0 => {
                    table.insert(arg[..idx].to_lowercase(), arg[idx + 1..].to_owned());
                }
                _ => {
                    if !positional.is_empty() {
                        positional.push(POSITIONAL_SEPARATOR);
                    }
                    positional.push_str(arg);
                }
            }
        }
        table.insert(ARGS_KEY.to_owned(), positional);
        Self { table }
    }

    /// Look up a parameter, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Set (or replace) a parameter.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.table.insert(name.to_lowercase(), value.into());
    }

    /// The separator-joined positional arguments, empty when none.
    pub fn positional(&self) -> &str {
        self.get(ARGS_KEY).unwrap_or("")
    }

    /// Iterate positional arguments one by one.
    pub fn positional_args(&self) -> impl Iterator<Item = &str> {
        self.positional()
            .split(POSITIONAL_SEPARATOR)
            .filter(|s| !s.is_empty())
    }

    /// Iterate named parameters, excluding the reserved positional key.
    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table
            .iter()
            .filter(|(k, _)| k.as_str() != ARGS_KEY)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries, including the positional entry when present.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
