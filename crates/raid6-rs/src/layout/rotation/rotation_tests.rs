use super::*;

#[test]
fn parity_disks_rotate_with_the_stripe() {
    assert_eq!(p_disk(0, 6), 4);
    assert_eq!(q_disk(0, 6), 5);
    assert_eq!(p_disk(1, 6), 5);
    assert_eq!(q_disk(1, 6), 0);
    assert_eq!(p_disk(2, 6), 0);
    assert_eq!(q_disk(2, 6), 1);
    for disks in 4..=9 {
        for stripe in 0..3 * disks {
            let (p, q) = (p_disk(stripe, disks), q_disk(stripe, disks));
            assert_ne!(p, q);
            assert_eq!(q, (p + 1) % disks, "Q trails P by one");
        }
    }
}

#[test]
fn real_and_algo_indices_are_inverse() {
    for disks in 4..=9 {
        for stripe in 0..2 * disks {
            let placement = Placement::of_stripe(stripe, disks);
            for d in 0..disks {
                assert_eq!(placement.to_real(placement.to_algo(d)), d, "disks={disks} stripe={stripe} d={d}");
            }
            for a in 0..disks {
                assert_eq!(placement.to_algo(placement.to_real(a)), a, "disks={disks} stripe={stripe} a={a}");
            }
        }
    }
}

#[test]
fn data_disks_keep_ascending_order() {
    for disks in 4..=9 {
        for stripe in 0..disks {
            let placement = Placement::of_stripe(stripe, disks);
            let data: Vec<usize> = (0..disks).filter(|&d| placement.is_data(d)).collect();
            for (algo, &real) in data.iter().enumerate() {
                assert_eq!(placement.to_algo(real), algo);
            }
            assert_eq!(placement.to_algo(placement.p()), disks - 2);
            assert_eq!(placement.to_algo(placement.q()), disks - 1);
        }
    }
}

#[test]
fn roles_partition_the_stripe() {
    for disks in 4..=9 {
        for stripe in 0..disks {
            let placement = Placement::of_stripe(stripe, disks);
            let mut data_indices = Vec::new();
            let (mut parity, mut syndrome) = (0, 0);
            for d in 0..disks {
                match placement.role(d) {
                    StripeRole::Data(i) => data_indices.push(i),
                    StripeRole::Parity => parity += 1,
                    StripeRole::Syndrome => syndrome += 1,
                }
            }
            assert_eq!(parity, 1);
            assert_eq!(syndrome, 1);
            assert_eq!(data_indices, (0..disks - 2).collect::<Vec<_>>());
        }
    }
}
