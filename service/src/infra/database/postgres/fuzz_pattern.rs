//! [`FuzzPattern`] definition.

use derive_more::{AsRef, Display};
use itertools::Itertools as _;
use postgres_types::{FromSql, ToSql};

/// `SIMILAR TO` pattern matching any of the words of a search input.
#[derive(AsRef, Clone, Debug, Display, Eq, FromSql, PartialEq, ToSql)]
#[as_ref(str)]
#[postgres(transparent)]
pub struct FuzzPattern(String);

impl FuzzPattern {
    /// Characters having a special meaning in `SIMILAR TO` patterns.
    const SPECIAL: &'static str = r"\%_|*+?{}()[]";

    /// Creates a new [`FuzzPattern`] out of the given `input`.
    ///
    /// [`None`] is returned if the `input` has no words.
    #[must_use]
    pub fn new(input: &str) -> Option<Self> {
        let mut words = input.split_whitespace().peekable();
        words.peek()?;
        let alternatives = words.format_with("|", |word, f| {
            let escaped = word.chars().format_with("", |c, f| {
                if Self::SPECIAL.contains(c) {
                    f(&format_args!("\\{c}"))
                } else {
                    f(&c)
                }
            });
            f(&format_args!("%{escaped}%"))
        });
        Some(Self(format!("({alternatives})")))
    }
}
