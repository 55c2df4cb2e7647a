//! Macros for ergonomic state construction.

/// Generate a closed set of unit states with a [`StateSlot`] implementation.
///
/// The generated enum derives `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash` and
/// `Debug`, names each state after its variant and installs transitions by
/// replacing itself. Only `handle` is left to write by hand. The same enums
/// work as state tags for declarative transition tables.
///
/// [`StateSlot`]: crate::core::StateSlot
///
/// # Example
///
/// ```
/// use statekit::core::StateSlot;
/// use statekit::state_enum;
///
/// state_enum! {
///     pub enum Phase {
///         Processing,
///         Done,
///     }
/// }
///
/// let mut phase = Phase::Processing;
/// assert_eq!(phase.name(), "Processing");
/// phase.enter(Phase::Done);
/// assert_eq!(phase, Phase::Done);
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::StateSlot for $name {
            type Next = Self;

            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn enter(&mut self, next: Self) {
                *self = next;
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::core::StateSlot::name(self))
            }
        }
    };
}
