//! AVX2 intrinsics for f32 / f64 vector operations

use std::arch::x86_64::*;

#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn dot_product_f64(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    let chunks = n / 4;

    let mut sum_vec = _mm256_setzero_pd();
    for i in 0..chunks {
        let offset = i * 4;
        let a_vec = _mm256_loadu_pd(a.as_ptr().add(offset));
        let b_vec = _mm256_loadu_pd(b.as_ptr().add(offset));
        sum_vec = _mm256_fmadd_pd(a_vec, b_vec, sum_vec);
    }

    let lanes = std::mem::transmute::<__m256d, [f64; 4]>(sum_vec);
    let mut sum = lanes[0] + lanes[1] + lanes[2] + lanes[3];
    for i in chunks * 4..n {
        sum += a[i] * b[i];
    }
    sum
}

#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn dot_product_f32(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    let chunks = n / 8;

    let mut sum_vec = _mm256_setzero_ps();
    for i in 0..chunks {
        let offset = i * 8;
        let a_vec = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b_vec = _mm256_loadu_ps(b.as_ptr().add(offset));
        sum_vec = _mm256_fmadd_ps(a_vec, b_vec, sum_vec);
    }

    let lanes = std::mem::transmute::<__m256, [f32; 8]>(sum_vec);
    let mut sum = lanes.iter().sum::<f32>();
    for i in chunks * 8..n {
        sum += a[i] * b[i];
    }
    sum
}

#[target_feature(enable = "avx2")]
pub unsafe fn sum_f64(data: &[f64]) -> f64 {
    let n = data.len();
    let chunks = n / 4;

    let mut sum_vec = _mm256_setzero_pd();
    for i in 0..chunks {
        let v = _mm256_loadu_pd(data.as_ptr().add(i * 4));
        sum_vec = _mm256_add_pd(sum_vec, v);
    }

    let lanes = std::mem::transmute::<__m256d, [f64; 4]>(sum_vec);
    let mut sum = lanes[0] + lanes[1] + lanes[2] + lanes[3];
    for &v in &data[chunks * 4..] {
        sum += v;
    }
    sum
}

#[target_feature(enable = "avx2")]
pub unsafe fn sum_f32(data: &[f32]) -> f32 {
    let n = data.len();
    let chunks = n / 8;

    let mut sum_vec = _mm256_setzero_ps();
    for i in 0..chunks {
        let v = _mm256_loadu_ps(data.as_ptr().add(i * 8));
        sum_vec = _mm256_add_ps(sum_vec, v);
    }

    let lanes = std::mem::transmute::<__m256, [f32; 8]>(sum_vec);
    let mut sum = lanes.iter().sum::<f32>();
    for &v in &data[chunks * 8..] {
        sum += v;
    }
    sum
}

#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn axpy_f64(a: f64, x: &[f64], y: &mut [f64]) {
    let n = x.len().min(y.len());
    let chunks = n / 4;
    let a_vec = _mm256_set1_pd(a);

    for i in 0..chunks {
        let offset = i * 4;
        let x_vec = _mm256_loadu_pd(x.as_ptr().add(offset));
        let y_ptr = y.as_mut_ptr().add(offset);
        let y_vec = _mm256_loadu_pd(y_ptr);
        _mm256_storeu_pd(y_ptr, _mm256_fmadd_pd(a_vec, x_vec, y_vec));
    }
    for i in chunks * 4..n {
        y[i] += a * x[i];
    }
}

#[target_feature(enable = "avx2", enable = "fma")]
pub unsafe fn axpy_f32(a: f32, x: &[f32], y: &mut [f32]) {
    let n = x.len().min(y.len());
    let chunks = n / 8;
    let a_vec = _mm256_set1_ps(a);

    for i in 0..chunks {
        let offset = i * 8;
        let x_vec = _mm256_loadu_ps(x.as_ptr().add(offset));
        let y_ptr = y.as_mut_ptr().add(offset);
        let y_vec = _mm256_loadu_ps(y_ptr);
        _mm256_storeu_ps(y_ptr, _mm256_fmadd_ps(a_vec, x_vec, y_vec));
    }
    for i in chunks * 8..n {
        y[i] += a * x[i];
    }
}
