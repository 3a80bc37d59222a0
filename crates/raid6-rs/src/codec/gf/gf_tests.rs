use super::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn tables_match_shift_and_reduce() {
    let t = tables();
    for a in 0..=255u8 {
        for b in 0..=255u8 {
            assert_eq!(t.mul(a, b), mul_slow(a, b), "MUL[{a}][{b}]");
        }
    }
}

#[test]
fn multiplication_is_commutative_and_distributive() {
    let t = tables();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let (a, b, c) = (rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>());
        assert_eq!(t.mul(a, b), t.mul(b, a));
        assert_eq!(t.mul(a, add(b, c)), add(t.mul(a, b), t.mul(a, c)));
    }
}

#[test]
fn one_is_the_multiplicative_identity() {
    let t = tables();
    for a in 0..=255u8 {
        assert_eq!(t.mul(a, 1), a);
        assert_eq!(t.mul(a, 0), 0);
    }
}

#[test]
fn inverse_round_trips() {
    let t = tables();
    for a in 1..=255u8 {
        let inv = t.inv(a).expect("non-zero element has an inverse");
        assert_eq!(t.mul(a, inv), 1, "a={a}");
    }
    assert_eq!(t.inv(0), Err(crate::error::RaidError::ArithmeticDomain));
}

#[test]
fn division_round_trips() {
    let t = tables();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..2000 {
        let a = rng.random::<u8>();
        let b = rng.random_range(1..=255u8);
        let q = t.div(a, b).expect("divisor is non-zero");
        assert_eq!(t.mul(q, b), a);
    }
    assert_eq!(t.div(5, 0), Err(crate::error::RaidError::ArithmeticDomain));
}

#[test]
fn power_follows_exponent_arithmetic() {
    let t = tables();
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..2000 {
        let a = rng.random_range(1..=255u8);
        let (i, j) = (rng.random::<u8>(), rng.random::<u8>());
        let sum = ((u16::from(i) + u16::from(j)) % 255) as u8;
        assert_eq!(t.mul(t.pow(a, i), t.pow(a, j)), t.pow(a, sum), "a={a} i={i} j={j}");
    }
}

#[test]
fn power_zero_conventions() {
    let t = tables();
    assert_eq!(t.pow(0, 0), 1);
    for k in 1..=255u8 {
        assert_eq!(t.pow(0, k), 0);
    }
    for a in 0..=255u8 {
        assert_eq!(t.pow(a, 0), 1);
        assert_eq!(t.pow(a, 1), a);
    }
}

#[test]
fn generator_order_is_255() {
    let t = tables();
    assert_eq!(t.pow(GENERATOR, 255), 1);
    for k in 1..255u8 {
        assert_ne!(t.pow(GENERATOR, k), 1, "g^{k} must not be 1");
    }
}

#[test]
fn log_inverts_generator_powers() {
    let t = tables();
    for i in 0..255u8 {
        assert_eq!(t.log(t.pow(GENERATOR, i)).unwrap(), i);
    }
    for a in 1..=255u8 {
        assert_eq!(t.pow(GENERATOR, t.log(a).unwrap()), a);
    }
    assert_eq!(t.log(0), Err(crate::error::RaidError::ArithmeticDomain));
}
