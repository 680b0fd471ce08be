//! The `define_id!` macro.

/// Declares a `u64` newtype id whose string form is `{prefix}_{number}`.
///
/// Ordering, hashing and equality follow the number. Serde uses the string
/// form, so ids read the same in logs and JSON.
///
/// ```ignore
/// define_id!(
///     /// A host in the fleet.
///     NodeId,
///     "node"
/// );
/// assert_eq!("node_3".parse::<NodeId>()?, NodeId::new(3));
/// ```
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            #[must_use]
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            #[must_use]
            pub const fn value(&self) -> u64 {
                self.0
            }

            /// Strict parse: the prefix must match and the number must be
            /// plain decimal digits with no leading zeros.
            pub fn parse(s: &str) -> Result<Self, $crate::IdError> {
                if s.is_empty() {
                    return Err($crate::IdError::Empty);
                }

                let Some((prefix, number)) = s.split_once('_') else {
                    return Err($crate::IdError::MissingSeparator {
                        input: s.to_string(),
                    });
                };

                if prefix != Self::PREFIX {
                    return Err($crate::IdError::WrongKind {
                        expected: Self::PREFIX,
                        actual: prefix.to_string(),
                    });
                }

                let canonical = !number.is_empty()
                    && number.bytes().all(|b| b.is_ascii_digit())
                    && (number == "0" || !number.starts_with('0'));
                if !canonical {
                    return Err($crate::IdError::NotCanonical(number.to_string()));
                }

                number
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| $crate::IdError::Overflow(number.to_string()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Self::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
