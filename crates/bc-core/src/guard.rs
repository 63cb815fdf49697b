//! RAII scoped-mutation guard, the direct counterpart of the original
//! `BCLIBC_ValueGuard` template: save the old value, install the new one,
//! restore the old one when the guard drops (including on an early return
//! or a panic unwind out of the solver that created it).

/// Temporarily overwrites `*target` with `new_value`, restoring the original
/// value when the guard is dropped.
///
/// ```ignore
/// let mut cfg = Config::default();
/// {
///     let _guard = ValueGuard::new(&mut cfg.c_minimum_velocity, 0.0);
///     // cfg.c_minimum_velocity == 0.0 here
/// }
/// // cfg.c_minimum_velocity restored
/// ```
pub struct ValueGuard<'a, T> {
    target: &'a mut T,
    old_value: Option<T>,
}

impl<'a, T> ValueGuard<'a, T> {
    pub fn new(target: &'a mut T, new_value: T) -> Self {
        let old_value = std::mem::replace(target, new_value);
        ValueGuard {
            target,
            old_value: Some(old_value),
        }
    }

    /// Disarms the guard: the current value is kept and nothing is restored
    /// on drop.
    pub fn dismiss(mut self) {
        self.old_value = None;
    }
}

impl<T> Drop for ValueGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(old) = self.old_value.take() {
            *self.target = old;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_on_drop() {
        let mut x = 10;
        {
            let _guard = ValueGuard::new(&mut x, 20);
            assert_eq!(x, 20);
        }
        assert_eq!(x, 10);
    }

    #[test]
    fn dismiss_keeps_new_value() {
        let mut x = 10;
        {
            let guard = ValueGuard::new(&mut x, 20);
            guard.dismiss();
        }
        assert_eq!(x, 20);
    }

    #[test]
    fn nested_guards_restore_in_reverse_order() {
        let mut x = 1.0_f64;
        {
            let _outer = ValueGuard::new(&mut x, 2.0);
            {
                let _inner = ValueGuard::new(&mut x, 3.0);
                assert_eq!(x, 3.0);
            }
            assert_eq!(x, 2.0);
        }
        assert_eq!(x, 1.0);
    }
}
