//! Operator-implementation macros for transparent newtypes.

/// Implements a standard operator trait for a single-field tuple struct. The trait must be in scope at the call
/// site.
///
/// * `binary`: `impl Trait for T { fn method(self, rhs: Self) -> Self }`
/// * `inplace`: `impl Trait for T { fn method(&mut self, rhs: Self) }`
/// * `unary`: `impl Trait for T { fn method(self) -> Self }`
#[macro_export]
macro_rules! op {
    (binary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self::Output {
                Self($trait::$method(self.0, rhs.0))
            }
        }
    };
    (inplace $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            fn $method(&mut self, rhs: Self) {
                $trait::$method(&mut self.0, rhs.0);
            }
        }
    };
    (unary $t:ty, $trait:ident, $method:ident) => {
        impl $trait for $t {
            type Output = Self;

            fn $method(self) -> Self::Output {
                Self($trait::$method(self.0))
            }
        }
    };
}
