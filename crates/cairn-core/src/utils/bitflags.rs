// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A macro to declare typed bit-flag words.
//!
//! GPU rows store flags as plain integers, so the generated types stay
//! `Copy` newtypes around the raw word and convert freely in both directions.

#[macro_export]
#[doc(hidden)]
macro_rules! cairn_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The set without any flag.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Wraps a raw word. Bits without a named flag are kept.
            pub const fn from_bits(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns the raw word.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Returns `true` if no bit is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns `true` if every bit of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if `self` and `other` share at least one bit.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets the bits of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears the bits of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Sets or clears the bits of `other` depending on `value`.
            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            /// Returns a copy with the bits of `other` set.
            #[must_use]
            pub const fn with(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns a copy with the bits of `other` cleared.
            #[must_use]
            pub const fn without(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::ops::Not for $name {
            type Output = Self;
            fn not(self) -> Self {
                Self { bits: !self.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::ops::BitAndAssign for $name {
            fn bitand_assign(&mut self, other: Self) {
                self.bits &= other.bits;
            }
        }

        impl From<$name> for $ty {
            fn from(flags: $name) -> $ty {
                flags.bits
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut rest = self.bits;
                let mut names: [&str; 64] = [""; 64];
                let mut count = 0usize;
                $(
                    if $flag_value != 0 && (rest & $flag_value) == $flag_value && count < names.len() {
                        names[count] = stringify!($flag_name);
                        count += 1;
                        rest &= !$flag_value;
                    }
                )*

                write!(f, "{}(", stringify!($name))?;
                if count == 0 && rest == 0 {
                    write!(f, "EMPTY")?;
                }
                for (i, name) in names[..count].iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{name}")?;
                }
                if rest != 0 {
                    if count > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{:#x}", rest)?;
                }
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    cairn_bitflags! {
        /// Flags used to exercise the macro.
        pub struct TestFlags: u32 {
            const A = 1 << 0;
            const B = 1 << 1;
            const C = 1 << 4;
            const AC = Self::A.bits() | Self::C.bits();
        }
    }

    #[test]
    fn test_default_is_empty() {
        assert!(TestFlags::default().is_empty());
        assert_eq!(TestFlags::default(), TestFlags::EMPTY);
    }

    #[test]
    fn test_contains_and_intersects() {
        let flags = TestFlags::A | TestFlags::C;
        assert!(flags.contains(TestFlags::AC));
        assert!(flags.intersects(TestFlags::A | TestFlags::B));
        assert!(!flags.contains(TestFlags::A | TestFlags::B));
        assert!(!flags.intersects(TestFlags::B));
    }

    #[test]
    fn test_set_toggles_by_value() {
        let mut flags = TestFlags::EMPTY;
        flags.set(TestFlags::B, true);
        assert_eq!(flags, TestFlags::B);
        flags.set(TestFlags::B, false);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_with_without_are_const_friendly() {
        const BOTH: TestFlags = TestFlags::A.with(TestFlags::B);
        assert_eq!(BOTH.bits(), 0b11);
        assert_eq!(BOTH.without(TestFlags::A), TestFlags::B);
    }

    #[test]
    fn test_raw_round_trip_keeps_unknown_bits() {
        let flags = TestFlags::from_bits(0x8000_0001);
        assert!(flags.contains(TestFlags::A));
        assert_eq!(u32::from(flags), 0x8000_0001);
    }

    #[test]
    fn test_debug_output() {
        assert_eq!(format!("{:?}", TestFlags::EMPTY), "TestFlags(EMPTY)");
        assert_eq!(format!("{:?}", TestFlags::A | TestFlags::B), "TestFlags(A | B)");
        assert_eq!(format!("{:?}", TestFlags::from_bits(0x100)), "TestFlags(0x100)");
    }
}
