//! Rotating P/Q placement and real ↔ algorithmic disk index mapping.
//!
//! The codec sees every stripe as `[data…, P, Q]`; on disk the P and Q
//! members rotate with the stripe index. `Placement` is the only way to
//! convert between the two index spaces.

#[cfg(test)]
mod rotation_tests;

/// `p_disk` returns the real disk holding the P block of a stripe.
#[must_use]
pub const fn p_disk(stripe: usize, disks: usize) -> usize {
    (stripe + disks - 2) % disks
}

/// `q_disk` returns the real disk holding the Q block of a stripe.
#[must_use]
pub const fn q_disk(stripe: usize, disks: usize) -> usize {
    (stripe + disks - 1) % disks
}

/// `StripeRole` tags what a real disk stores within one stripe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StripeRole {
    /// Data member at the given algorithmic index.
    Data(usize),
    /// XOR parity member.
    Parity,
    /// Reed–Solomon syndrome member.
    Syndrome,
}

/// `Placement` maps between real disk indices and algorithmic order for
/// a single stripe. Data disks keep their ascending real order and fill
/// algorithmic positions `0..n-2`; P and Q take `n-2` and `n-1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    disks: usize,
    p: usize,
    q: usize,
}

impl Placement {
    #[must_use]
    pub const fn of_stripe(stripe: usize, disks: usize) -> Self {
        Self {
            disks,
            p: p_disk(stripe, disks),
            q: q_disk(stripe, disks),
        }
    }

    #[must_use]
    pub const fn p(&self) -> usize {
        self.p
    }

    #[must_use]
    pub const fn q(&self) -> usize {
        self.q
    }

    /// `is_data` reports whether the real disk is a data member here.
    #[must_use]
    pub const fn is_data(&self, real: usize) -> bool {
        real != self.p && real != self.q
    }

    /// `to_algo` converts a real disk index to its algorithmic index.
    #[must_use]
    pub const fn to_algo(&self, real: usize) -> usize {
        if real == self.p {
            return self.disks - 2;
        }
        if real == self.q {
            return self.disks - 1;
        }
        // Q always sits directly after P (mod n), so the data disks are
        // either split around the P/Q pair or, when P is the last disk,
        // shifted by the leading Q.
        if self.p == self.disks - 1 {
            return real - 1;
        }
        if real > self.p {
            return real - 2;
        }
        real
    }

    /// `to_real` converts an algorithmic index back to a real disk index.
    #[must_use]
    pub const fn to_real(&self, algo: usize) -> usize {
        if algo == self.disks - 2 {
            return self.p;
        }
        if algo == self.disks - 1 {
            return self.q;
        }
        if self.p == self.disks - 1 {
            return algo + 1;
        }
        if algo >= self.p {
            return algo + 2;
        }
        algo
    }

    /// `role` reports what the real disk stores in this stripe.
    #[must_use]
    pub const fn role(&self, real: usize) -> StripeRole {
        if real == self.p {
            StripeRole::Parity
        } else if real == self.q {
            StripeRole::Syndrome
        } else {
            StripeRole::Data(self.to_algo(real))
        }
    }
}
