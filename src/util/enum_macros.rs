/// Declares an open BACnet enumeration.
///
/// BACnet enumerations are extensible: a peer may send any value of the
/// underlying width, and values inside the vendor range are proprietary
/// rather than invalid. The generated enum carries the named variants plus
/// `Proprietary(value)` for the vendor range and `Reserved(value)` for
/// everything else, so decoding never fails.
///
/// ```rust
/// use bacnet_controller::open_enum;
///
/// open_enum! {
///     /// Fan speed selector.
///     pub enum FanSpeed: u16, proprietary (64..=1023) {
///         Off = 0,
///         Low = 1,
///         High = 2,
///     }
/// }
///
/// assert_eq!(FanSpeed::from(2u16), FanSpeed::High);
/// assert_eq!(FanSpeed::from(100u16), FanSpeed::Proprietary(100));
/// assert_eq!(FanSpeed::from(9u16), FanSpeed::Reserved(9));
/// assert_eq!(u16::from(FanSpeed::Low), 1);
/// assert_eq!(FanSpeed::High.to_string(), "High");
/// assert_eq!("Low".parse::<FanSpeed>(), Ok(FanSpeed::Low));
/// ```
#[macro_export]
macro_rules! open_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ty, proprietary ($range:expr) {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Vendor-specific value.
            Proprietary($repr),
            /// Value outside every defined range.
            Reserved($repr),
        }

        impl $name {
            /// Named variants in declaration order.
            pub const NAMED: &'static [$name] = &[$($name::$variant,)+];

            /// Returns true for values that are neither named nor proprietary.
            pub fn is_reserved(&self) -> bool {
                matches!(self, $name::Reserved(_))
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                    $name::Proprietary(v) => write!(f, "Proprietary({})", v),
                    $name::Reserved(v) => write!(f, "Reserved({})", v),
                }
            }
        }

        impl From<$name> for $repr {
            fn from(value: $name) -> $repr {
                match value {
                    $($name::$variant => $value,)+
                    $name::Proprietary(v) | $name::Reserved(v) => v,
                }
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> $name {
                $(
                    if value == $value {
                        return $name::$variant;
                    }
                )+
                if ($range).contains(&value) {
                    $name::Proprietary(value)
                } else {
                    $name::Reserved(value)
                }
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::util::UnknownVariant;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s {
                    $(stringify!($variant) => Ok($name::$variant),)+
                    other => other
                        .parse::<$repr>()
                        .map($name::from)
                        .map_err(|_| $crate::util::UnknownVariant(other.into())),
                }
            }
        }
    };
}
