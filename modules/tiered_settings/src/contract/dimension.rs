//! Deployment dimensions: tiers and data centers

use std::fmt::Debug;
use std::hash::Hash;

/// A deployment axis with a closed set of values (e.g. the tier or the data center).
///
/// Values are addressed by name on the wire; [`Dimension::parse`] matches names
/// case-insensitively. Use the [`dimension!`](crate::dimension) macro to declare one.
pub trait Dimension: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every value of the dimension, in declaration order.
    fn variants() -> &'static [Self];

    /// Wire name of the value.
    fn name(&self) -> &'static str;

    /// Look a value up by name.
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::variants()
            .iter()
            .copied()
            .find(|variant| variant.name().eq_ignore_ascii_case(text))
    }
}

/// Declare a fieldless enum implementing [`Dimension`] and `Display`.
///
/// ```
/// tiered_settings::dimension! {
///     pub enum Tier { Local, Dev, Test, Prod }
/// }
/// ```
#[macro_export]
macro_rules! dimension {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::contract::Dimension for $name {
            fn variants() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::contract::Dimension::name(self))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::dimension! {
        enum Region { Local, London, NewYork }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Region::parse("london"), Some(Region::London));
        assert_eq!(Region::parse(" NewYork "), Some(Region::NewYork));
        assert_eq!(Region::parse("Tokyo"), None);
    }

    #[test]
    fn test_variants_keep_declaration_order() {
        let names: Vec<_> = Region::variants().iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["Local", "London", "NewYork"]);
        assert_eq!(Region::NewYork.to_string(), "NewYork");
    }
}
