pub mod dx7;
pub mod editor;

use std::fmt;

/// Error type for parsing data from MIDI System Exclusive bytes
/// or from the JSON voice schema.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum ParseError {
    InvalidLength(u32, u32),  // actual, expected
    InvalidChecksum(u8, u8),  // actual, expected
    InvalidData(u32),  // offset in data
    OutOfRange(&'static str, i32),  // field, value
    UnknownName(&'static str),  // field
    Unidentified,  // can't identify this kind
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            ParseError::InvalidLength(actual, expected) => format!("Got {} bytes of data, expected {} bytes.", actual, expected),
            ParseError::InvalidChecksum(actual, expected) => format!("Computed checksum was {:02X}H, expected {:02X}H.", actual, expected),
            ParseError::InvalidData(offset) => format!("Invalid data at offset {}.", offset),
            ParseError::OutOfRange(field, value) => format!("Value {} is out of range for {}.", value, field),
            ParseError::UnknownName(field) => format!("Unrecognized name for {}.", field),
            ParseError::Unidentified => String::from("Unable to identify this System Exclusive file."),
        })
    }
}

impl std::error::Error for ParseError {}

// Here is a trick learned from "Programming Rust" 2nd Ed., p. 280.
// Define associated consts in a trait, but don't give them a value.
// Let the implementor of the trait do that.
pub trait Ranged: Sized {
    const FIRST: i32;
    const LAST: i32;
    const DEFAULT: i32;

    fn new(value: i32) -> Self;
    fn value(&self) -> i32;
    fn contains(value: i32) -> bool;
    fn random() -> Self;

    /// Makes a value only if it is in range.
    fn try_new(value: i32) -> Option<Self> {
        if Self::contains(value) {
            Some(Self::new(value))
        }
        else {
            None
        }
    }
}

// The `ranged_impl` macro generates an implementation of the `Ranged` trait,
// along with implementations of the `Default` and `Display` traits based on
// the values supplied as parameters (type name, first, last, default).
// Types that display themselves differently pass `custom_display`
// and get no `Display` impl.
#[macro_export]
macro_rules! ranged_impl {
    (@ranged $typ:ty, $first:expr, $last:expr, $default:expr) => {
        impl $crate::Ranged for $typ {
            const FIRST: i32 = $first;
            const LAST: i32 = $last;
            const DEFAULT: i32 = $default;

            fn new(value: i32) -> Self {
                if <Self as $crate::Ranged>::contains(value) {
                    Self(value)
                }
                else {
                    panic!("expected value in range [{}...{}], got {}",
                        <Self as $crate::Ranged>::FIRST,
                        <Self as $crate::Ranged>::LAST,
                        value);
                }
            }

            fn value(&self) -> i32 { self.0 }

            fn contains(value: i32) -> bool {
                value >= <Self as $crate::Ranged>::FIRST
                    && value <= <Self as $crate::Ranged>::LAST
            }

            fn random() -> Self {
                use rand::Rng;
                let mut rng = rand::rng();
                <Self as $crate::Ranged>::new(rng.random_range(
                    <Self as $crate::Ranged>::FIRST..=<Self as $crate::Ranged>::LAST))
            }
        }

        impl Default for $typ {
            fn default() -> Self {
                <Self as $crate::Ranged>::new(<Self as $crate::Ranged>::DEFAULT)
            }
        }
    };

    ($typ:ty, $first:expr, $last:expr, $default:expr, custom_display) => {
        $crate::ranged_impl!(@ranged $typ, $first, $last, $default);
    };

    ($typ:ty, $first:expr, $last:expr, $default:expr) => {
        $crate::ranged_impl!(@ranged $typ, $first, $last, $default);

        impl std::fmt::Display for $typ {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    }
}

/// Reads a ranged value from a data byte, reporting the offset on failure.
pub(crate) fn ranged_from_byte<T: Ranged>(data: &[u8], offset: usize) -> Result<T, ParseError> {
    let byte = data.get(offset).ok_or(ParseError::InvalidData(offset as u32))?;
    T::try_new(*byte as i32).ok_or(ParseError::InvalidData(offset as u32))
}

/// Reads a ranged value from a JSON schema field.
pub(crate) fn ranged_from_field<T: Ranged>(field: &'static str, value: i32) -> Result<T, ParseError> {
    T::try_new(value).ok_or(ParseError::OutOfRange(field, value))
}
