//! Macro for implementing Display and FromStr for wire-level enums
//!
//! Several domain enums travel as short lowercase strings (auth methods,
//! state names in logs). This macro keeps their `Display` and `FromStr`
//! implementations in one place. Parsing is case-insensitive.
//!
//! # Example
//!
//! ```rust
//! use workbridge_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Stable,
//!     Preview,
//! }
//!
//! impl_domain_status_conversions!(Channel {
//!     Stable => "stable",
//!     Preview => "preview",
//! });
//!
//! assert_eq!(Channel::Preview.to_string(), "preview");
//! assert_eq!("STABLE".parse::<Channel>(), Ok(Channel::Stable));
//! ```

/// Implements Display and FromStr traits for string-mapped enums
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Grant {
        DeviceCode,
        Refresh,
    }

    impl_domain_status_conversions!(Grant {
        DeviceCode => "device_code",
        Refresh => "refresh",
    });

    #[test]
    fn displays_mapped_string() {
        assert_eq!(Grant::DeviceCode.to_string(), "device_code");
        assert_eq!(Grant::Refresh.to_string(), "refresh");
    }

    #[test]
    fn parses_case_insensitively_and_trims() {
        assert_eq!(Grant::from_str("DEVICE_CODE").unwrap(), Grant::DeviceCode);
        assert_eq!(Grant::from_str("  Refresh ").unwrap(), Grant::Refresh);
    }

    #[test]
    fn rejects_unknown_values_with_enum_name() {
        let err = Grant::from_str("implicit").unwrap_err();
        assert!(err.contains("Grant"));
        assert!(err.contains("implicit"));
    }
}
