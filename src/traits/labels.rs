//! Closed label sets.
//!
//! Every enumerated instrument setting (range, rate, trigger source, coupling, ...) is a Rust
//! enum with a canonical label. Parsing a label outside the set fails with
//! [`InstrumentError::InvalidChoice`](crate::InstrumentError::InvalidChoice); drivers then map
//! each member to their own wire token with an exhaustive `match`.

/// Declares an enum whose members parse from, and display as, fixed labels.
///
/// ```ignore
/// closed_set! {
///     /// Measurement rate.
///     pub enum Rate: "multimeter rate" {
///         /// Slowest.
///         Slow => "slow",
///         /// Fastest.
///         Fast => "fast" | "FAST",
///     }
/// }
/// ```
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $kind:literal {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $label:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::InstrumentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    other => Err($crate::error::InstrumentError::invalid_choice($kind, other)),
                }
            }
        }
    };
}

pub(crate) use closed_set;

/// Find the member whose vendor token equals `reply`.
///
/// Used by getters to turn an instrument reply back into a typed value.
pub(crate) fn from_token<T: Copy>(
    all: &[T],
    token: impl Fn(T) -> &'static str,
    command: &str,
    reply: &str,
) -> crate::error::AppResult<T> {
    let reply_trimmed = reply.trim();
    all.iter()
        .copied()
        .find(|&member| token(member).eq_ignore_ascii_case(reply_trimmed))
        .ok_or_else(|| crate::error::InstrumentError::parse(command, reply))
}
