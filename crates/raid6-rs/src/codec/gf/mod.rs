//! GF(2⁸) arithmetic over the primitive polynomial 0x11D.

#[cfg(test)]
mod gf_tests;

use std::sync::OnceLock;

use crate::error::{RaidError, RaidResult};

/// Reduction polynomial x⁸+x⁴+x³+x²+1.
pub const POLY: u16 = 0x11d;
/// Field generator g.
pub const GENERATOR: u8 = 2;

/// `GfTables` holds the precomputed multiplication, power and discrete-log
/// tables. Every operation is a table lookup after the one-time build.
pub struct GfTables {
    mul: Box<[[u8; 256]; 256]>,
    pow: Box<[[u8; 256]; 256]>,
    log: [u8; 256],
}

static TABLES: OnceLock<GfTables> = OnceLock::new();

/// `tables` returns the process-wide table set, building it on first use.
/// The tables are immutable for the program lifetime.
pub fn tables() -> &'static GfTables {
    TABLES.get_or_init(GfTables::build)
}

/// `add` is addition in GF(2⁸); subtraction is the same operation.
#[inline]
#[must_use]
pub const fn add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// `mul_slow` multiplies by shift-and-reduce, without tables.
#[must_use]
pub const fn mul_slow(a: u8, b: u8) -> u8 {
    let mut a = a as u16;
    let mut b = b;
    let mut res = 0u16;
    while b > 0 {
        if b & 1 == 1 {
            res ^= a;
        }
        a <<= 1;
        if a & 0x100 != 0 {
            a ^= POLY;
        }
        b >>= 1;
    }
    res as u8
}

impl GfTables {
    fn build() -> Self {
        let mut mul = Box::new([[0u8; 256]; 256]);
        for a in 0..256usize {
            for b in 0..256usize {
                mul[a][b] = mul_slow(a as u8, b as u8);
            }
        }

        // Square-and-multiply over the finished MUL table; the neutral
        // accumulator makes pow(a, 0) = 1 for every a, including zero.
        let mut pow = Box::new([[0u8; 256]; 256]);
        for a in 0..256usize {
            for k in 0..256usize {
                let mut base = a as u8;
                let mut exp = k;
                let mut acc = 1u8;
                while exp > 0 {
                    if exp & 1 == 1 {
                        acc = mul[acc as usize][base as usize];
                    }
                    base = mul[base as usize][base as usize];
                    exp >>= 1;
                }
                pow[a][k] = acc;
            }
        }

        // g generates the full multiplicative group, so g^0..g^254 hit
        // every non-zero element exactly once.
        let mut log = [0u8; 256];
        let mut i = 0usize;
        while i < 255 {
            log[pow[GENERATOR as usize][i] as usize] = i as u8;
            i += 1;
        }

        Self { mul, pow, log }
    }

    /// `mul` multiplies two field elements.
    #[inline]
    #[must_use]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        self.mul[a as usize][b as usize]
    }

    /// `pow` raises a field element to a non-negative exponent.
    #[inline]
    #[must_use]
    pub fn pow(&self, a: u8, k: u8) -> u8 {
        self.pow[a as usize][k as usize]
    }

    /// `inv` returns the multiplicative inverse, `a^254`.
    ///
    /// # Errors
    /// `ArithmeticDomain` when `a` is zero.
    pub fn inv(&self, a: u8) -> RaidResult<u8> {
        if a == 0 {
            return Err(RaidError::ArithmeticDomain);
        }
        Ok(self.pow(a, 254))
    }

    /// `div` divides `a` by `b`.
    ///
    /// # Errors
    /// `ArithmeticDomain` when `b` is zero.
    pub fn div(&self, a: u8, b: u8) -> RaidResult<u8> {
        Ok(self.mul(a, self.inv(b)?))
    }

    /// `log` returns the exponent `i` with `g^i = a`.
    ///
    /// # Errors
    /// `ArithmeticDomain` when `a` is zero.
    pub fn log(&self, a: u8) -> RaidResult<u8> {
        if a == 0 {
            return Err(RaidError::ArithmeticDomain);
        }
        Ok(self.log[a as usize])
    }
}
