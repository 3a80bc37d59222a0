//! P/Q syndrome computation, erasure recovery and corruption location.
//!
//! Everything here works on a stripe in *algorithmic order*:
//! `[D0 .. D(k-1), P, Q]`, one symbol per member. The Q weight of data
//! symbol `i` is `g^i`, so a lost `D[x]` divides out of `ΔQ` as
//! `g^(255-x)` and a corrupt symbol is located at `log ΔQ - log ΔP`.
//! Callers must zero-fill the slots they know to be lost.


use crate::codec::gf::{self, GENERATOR};
use crate::error::{RaidError, RaidResult};

/// `Corruption` is the outcome of a single-symbol corruption scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Corruption {
    /// Both syndromes agree with the data.
    Clean,
    /// One symbol disagrees: its algorithmic index and corrected value.
    Corrupt { index: usize, value: u8 },
}

/// `encode` computes the P and Q syndromes of a data vector.
#[must_use]
pub fn encode(data: &[u8]) -> (u8, u8) {
    (xor_all(data), q_syndrome(data))
}

fn xor_all(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &d| acc ^ d)
}

/// Q = Σ D[i]·g^i, evaluated Horner-style from the tail.
fn q_syndrome(data: &[u8]) -> u8 {
    let t = gf::tables();
    data.iter().rev().fold(0, |acc, &d| t.mul(acc, GENERATOR) ^ d)
}

/// `fix` reconstructs the symbols at the failed algorithmic positions,
/// returned in `pos` order.
///
/// `stripe` is `[D0 .. D(k-1), P, Q]` with failed slots zeroed; `pos`
/// must be strictly ascending.
///
/// # Errors
/// `TooManyFailures` for more than two positions, `InvalidArgument` for
/// unsorted, duplicate or out-of-range positions.
pub fn fix(stripe: &[u8], pos: &[usize]) -> RaidResult<Vec<u8>> {
    let n = stripe.len();
    // Data weights are powers of g, so a stripe cannot be wider than the
    // multiplicative order of the field plus the two syndromes.
    if n < 4 || n > 257 {
        return Err(RaidError::InvalidArgument);
    }
    let k = n - 2;
    if pos.len() > 2 {
        return Err(RaidError::TooManyFailures);
    }
    if pos.windows(2).any(|w| w[0] >= w[1]) || pos.iter().any(|&p| p >= n) {
        return Err(RaidError::InvalidArgument);
    }

    let t = gf::tables();
    let data = &stripe[..k];
    match pos {
        [] => Ok(Vec::new()),
        [x] if *x == k => Ok(vec![xor_all(data)]),
        [x] if *x == k + 1 => Ok(vec![q_syndrome(data)]),
        // A zeroed lost slot drops out of the XOR, leaving the symbol.
        [_] => Ok(vec![stripe[k] ^ xor_all(data)]),
        [x, y] if *x == k && *y == k + 1 => Ok(vec![xor_all(data), q_syndrome(data)]),
        [x, y] if *y == k => {
            // Data and P lost: recover the data symbol from Q, then
            // recompute P over the completed vector.
            let dq = stripe[k + 1] ^ q_syndrome(data);
            let dx = t.mul(dq, t.pow(GENERATOR, (255 - *x) as u8));
            Ok(vec![dx, xor_all(data) ^ dx])
        }
        [x, y] if *y == k + 1 => {
            // Data and Q lost: recover the data symbol from P, then
            // recompute Q over the completed vector.
            let dx = stripe[k] ^ xor_all(data);
            let mut completed = data.to_vec();
            completed[*x] = dx;
            Ok(vec![dx, q_syndrome(&completed)])
        }
        [x, y] => {
            // Two data symbols lost. Solve
            //   dx ⊕ dy         = ΔP
            //   dx·g^x ⊕ dy·g^y = ΔQ
            let dp = stripe[k] ^ xor_all(data);
            let dq = stripe[k + 1] ^ q_syndrome(data);
            let a = t.pow(GENERATOR, (*y - *x) as u8);
            let b = t.pow(GENERATOR, (255 - *x) as u8);
            let tt = t.inv(a ^ 1)?;
            let dx = t.mul(t.mul(a, tt), dp) ^ t.mul(t.mul(b, tt), dq);
            Ok(vec![dx, dx ^ dp])
        }
        _ => Err(RaidError::TooManyFailures),
    }
}

/// `check` scans a stripe for a single silently-corrupted symbol.
///
/// Assumes at most one symbol is wrong; two corruptions that mask each
/// other are undetectable by construction.
///
/// # Errors
/// `Unrecoverable` when the syndromes implicate a position outside the
/// data range, i.e. the single-corruption assumption does not hold.
pub fn check(stripe: &[u8]) -> RaidResult<Corruption> {
    let n = stripe.len();
    if n < 4 || n > 257 {
        return Err(RaidError::InvalidArgument);
    }
    let k = n - 2;
    let t = gf::tables();
    let data = &stripe[..k];
    let dp = stripe[k] ^ xor_all(data);
    let dq = stripe[k + 1] ^ q_syndrome(data);
    match (dp, dq) {
        (0, 0) => Ok(Corruption::Clean),
        (0, _) => Ok(Corruption::Corrupt { index: k + 1, value: stripe[k + 1] ^ dq }),
        (_, 0) => Ok(Corruption::Corrupt { index: k, value: stripe[k] ^ dp }),
        _ => {
            let z = (usize::from(t.log(dq)?) + 255 - usize::from(t.log(dp)?)) % 255;
            if z >= k {
                return Err(RaidError::Unrecoverable);
            }
            Ok(Corruption::Corrupt { index: z, value: stripe[z] ^ dp })
        }
    }
}
