//! Equality Functions
//!
//! A signal or memo decides whether a new value is a change by calling its
//! equality function. Equal writes are no-ops and notify nobody.

use std::rc::Rc;

/// Shared equality function.
pub type EqualsFn<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// `PartialEq` comparison. The default for signals and memos.
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every write notifies.
///
/// Useful for values without a meaningful `PartialEq`, or when subscribers
/// must see every write.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// `f64` equality where `NaN` equals `NaN`, so writing `NaN` twice is a no-op.
pub fn nan_equals(a: &f64, b: &f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

pub(crate) fn default_equals<T: PartialEq + 'static>() -> EqualsFn<T> {
    Rc::new(equals::<T>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_equality() {
        assert!(equals(&42, &42));
        assert!(!equals(&42, &43));
        assert!(equals(&"hello", &"hello"));
    }

    #[test]
    fn never_equal_even_to_itself() {
        let value = vec![1, 2, 3];
        assert!(!never_equals(&value, &value));
    }

    #[test]
    fn nan_is_equal_to_nan() {
        assert!(nan_equals(&f64::NAN, &f64::NAN));
        assert!(!nan_equals(&f64::NAN, &1.0));
        assert!(nan_equals(&1.5, &1.5));
    }
}
