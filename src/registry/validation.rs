//! Shared bound checks for the parameter parsers.
//!
//! Centralizes range and length checks so every parser kind produces
//! consistent error messages.

use std::fmt::Display;

use crate::error::ValueError;

/// Check that `value` lies in `[min, max]`. Either bound may be absent.
pub fn check_range<T>(value: &T, min: Option<&T>, max: Option<&T>) -> Result<(), ValueError>
where
    T: PartialOrd + Display,
{
    if let Some(min) = min {
        if value < min {
            return Err(ValueError::new(format!(
                "{value} is less than the minimum of {min}"
            )));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ValueError::new(format!(
                "{value} is greater than the maximum of {max}"
            )));
        }
    }
    Ok(())
}

/// Check that a string length (in characters) lies in `[min, max]`.
pub fn check_length(length: usize, min: Option<usize>, max: Option<usize>) -> Result<(), ValueError> {
    if let Some(min) = min {
        if length < min {
            return Err(ValueError::new(format!(
                "length {length} is shorter than the minimum of {min}"
            )));
        }
    }
    if let Some(max) = max {
        if length > max {
            return Err(ValueError::new(format!(
                "length {length} is longer than the maximum of {max}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(check_range(&0, Some(&0), Some(&10)).is_ok());
        assert!(check_range(&10, Some(&0), Some(&10)).is_ok());
        assert!(check_range(&11, Some(&0), Some(&10)).is_err());
    }

    #[test]
    fn absent_bounds_accept_anything() {
        assert!(check_range(&i64::MIN, None, None).is_ok());
        assert!(check_length(0, None, None).is_ok());
    }

    #[test]
    fn length_messages_name_the_bound() {
        let err = check_length(2, Some(3), None).unwrap_err();
        assert_eq!(err.message(), "length 2 is shorter than the minimum of 3");
        let err = check_length(9, None, Some(8)).unwrap_err();
        assert_eq!(err.message(), "length 9 is longer than the maximum of 8");
    }
}
