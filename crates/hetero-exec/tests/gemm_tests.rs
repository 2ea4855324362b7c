//! GEMM on the host reference device
//!
//! Covers every transpose combination with and without accumulation, the
//! non-reading overwrite variant and offsets into larger buffers.

mod common;

use common::*;
use hetero_exec::{Buffer, ExecutionContext, ReferenceGemm, Transpose};
use proptest::prelude::*;

/// A is 2x3 and B is 3x2, so op(A)*op(B) is 2x2
const A: [&[f64]; 2] = [&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]];
const B: [&[f64]; 3] = [&[7.0, 8.0], &[9.0, 10.0], &[11.0, 12.0]];

/// Run C := alpha*op(A)*op(B) + beta*C with A and B stored as `trans_*` requires
fn run_case(trans_a: Transpose, trans_b: Transpose, beta: f64, c0: &[f64]) -> Vec<f64> {
    let (m, n, k) = (2, 2, 3);
    let a = col_major(&A);
    let b = col_major(&B);

    // Stored operand is op^-1 of the logical one
    let (a_stored, lda) = match trans_a {
        Transpose::NoTrans => (a, m),
        Transpose::Trans => (transpose(&a, m, k), k),
    };
    let (b_stored, ldb) = match trans_b {
        Transpose::NoTrans => (b, k),
        Transpose::Trans => (transpose(&b, k, n), n),
    };

    let ctx = ExecutionContext::host();
    let c = Buffer::from_vec(c0.to_vec());
    let status = ReferenceGemm::<f64>::new().compute(
        &ctx,
        trans_a,
        trans_b,
        m,
        n,
        k,
        2.0,
        &Buffer::from_vec(a_stored),
        lda,
        0,
        &Buffer::from_vec(b_stored),
        ldb,
        0,
        beta,
        &c,
        m,
        0,
    );
    assert!(status.is_ok(), "{status}");
    c.to_vec()
}

fn expected(beta: f64, c0: &[f64]) -> Vec<f64> {
    let ab = naive_product(&col_major(&A), &col_major(&B), 2, 2, 3);
    ab.iter()
        .zip(c0)
        .map(|(p, c)| 2.0 * p + if beta == 0.0 { 0.0 } else { beta * c })
        .collect()
}

#[test]
fn test_all_transposes_overwrite_and_accumulate() {
    use Transpose::*;
    let c0 = [1.0, -2.0, 3.0, -4.0];
    for trans_a in [NoTrans, Trans] {
        for trans_b in [NoTrans, Trans] {
            for beta in [0.0, 1.5] {
                let got = run_case(trans_a, trans_b, beta, &c0);
                let want = expected(beta, &c0);
                for (g, w) in got.iter().zip(&want) {
                    assert_relative_eq!(*g, *w, epsilon = 1e-12);
                }
            }
        }
    }
}

#[test]
fn test_overwrite_variant_never_reads_c() {
    let got = run_case(Transpose::NoTrans, Transpose::NoTrans, 0.0, &[f64::NAN; 4]);
    assert!(got.iter().all(|v| v.is_finite()));
    assert_eq!(got, expected(0.0, &[0.0; 4]));
}

#[test]
fn test_accumulate_propagates_garbage() {
    let got = run_case(Transpose::NoTrans, Transpose::NoTrans, 1.5, &[f64::NAN; 4]);
    assert!(got.iter().all(|v| v.is_nan()));
}

#[test]
fn test_offsets_and_leading_dimensions() {
    // 2x2 operands embedded in 3-row buffers starting one element in
    let a = Buffer::from_vec(vec![9.0, 1.0, 3.0, 9.0, 2.0, 4.0, 9.0]);
    let b = Buffer::from_vec(vec![9.0, 5.0, 7.0, 9.0, 6.0, 8.0, 9.0]);
    let c = Buffer::from_vec(vec![-1.0; 6]);

    let ctx = ExecutionContext::host();
    let status = ReferenceGemm::<f64>::new().compute(
        &ctx,
        Transpose::NoTrans,
        Transpose::NoTrans,
        2,
        2,
        2,
        1.0,
        &a,
        3,
        1,
        &b,
        3,
        1,
        0.0,
        &c,
        3,
        1,
    );
    assert!(status.is_ok(), "{status}");
    // [[1,2],[3,4]] * [[5,6],[7,8]] = [[19,22],[43,50]]
    assert_eq!(c.to_vec(), vec![-1.0, 19.0, 43.0, -1.0, 22.0, 50.0]);
}

#[test]
fn test_single_precision() {
    let ctx = ExecutionContext::host();
    let a = Buffer::from_vec(vec![1.0f32, 3.0, 2.0, 4.0]);
    let c = Buffer::zeros(4);
    let status = ReferenceGemm::<f32>::new().compute(
        &ctx,
        Transpose::NoTrans,
        Transpose::Trans,
        2,
        2,
        2,
        1.0,
        &a,
        2,
        0,
        &a,
        2,
        0,
        0.0,
        &c,
        2,
        0,
    );
    assert!(status.is_ok());
    // A*A^T with A = [[1,2],[3,4]]
    assert_eq!(c.to_vec(), vec![5.0f32, 11.0, 11.0, 25.0]);
    assert_eq!(ctx.cached_keys(), vec!["__blas_gemm_float"]);
}

#[test]
fn test_undersized_buffer_reports_launch_error() {
    let ctx = ExecutionContext::host();
    let small = Buffer::from_vec(vec![1.0f64; 3]);
    let c = Buffer::zeros(4);
    let status = ReferenceGemm::<f64>::new().compute(
        &ctx,
        Transpose::NoTrans,
        Transpose::NoTrans,
        2,
        2,
        2,
        1.0,
        &small,
        2,
        0,
        &small,
        2,
        0,
        0.0,
        &c,
        2,
        0,
    );
    assert!(matches!(status.first(), Some(hetero_core::Error::Launch(_))));
    assert_eq!(c.to_vec(), vec![0.0; 4]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_gemm_matches_naive_product(
        m in 1usize..6,
        n in 1usize..6,
        k in 1usize..6,
        seed in any::<u64>(),
    ) {
        let a = random_values(m * k, seed);
        let b = random_values(k * n, seed.wrapping_add(1));
        let c = Buffer::zeros(m * n);

        let ctx = ExecutionContext::host();
        let status = ReferenceGemm::<f64>::new().compute(
            &ctx, Transpose::NoTrans, Transpose::NoTrans, m, n, k,
            1.0, &Buffer::from_vec(a.clone()), m, 0, &Buffer::from_vec(b.clone()), k, 0,
            0.0, &c, m, 0,
        );
        prop_assert!(status.is_ok());

        let want = naive_product(&a, &b, m, n, k);
        for (g, w) in c.to_vec().iter().zip(&want) {
            prop_assert!((g - w).abs() < 1e-12);
        }
    }
}
