//! Closed-form statistical kernels.
//!
//! Only arithmetic and two distribution tails are needed:
//!   chi-square survival  Q(df/2, x/2), the regularized upper incomplete gamma
//!   normal survival      ½·erfc(z/√2), with erfc(x) = Q(½, x²)
//!
//! Both tests follow the asymptotic semantics of the common scientific
//! libraries: Yates continuity correction on 1-dof tables; Mann-Whitney
//! with midranks, tie-corrected variance, continuity correction and a
//! two-sided normal approximation clipped to 1.

const EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;
const MAX_ITER: usize = 500;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// ln Γ(x) for x > 0 (Lanczos, g = 7).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection.
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized upper incomplete gamma Q(a, x) = Γ(a, x) / Γ(a).
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    (sum * (-x + a * x.ln() - ln_gamma(a)).exp()).clamp(0.0, 1.0)
}

/// Modified Lentz evaluation of the continued fraction for Q.
fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    ((-x + a * x.ln() - ln_gamma(a)).exp() * h).clamp(0.0, 1.0)
}

/// P(X > x) for X ~ χ²(df).
pub fn chi2_sf(x: f64, df: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(df / 2.0, x / 2.0)
}

pub fn erfc(x: f64) -> f64 {
    let q = gamma_q(0.5, x * x);
    if x >= 0.0 { q } else { 2.0 - q }
}

/// P(Z > z) for a standard normal Z.
pub fn normal_sf(z: f64) -> f64 {
    0.5 * erfc(z / std::f64::consts::SQRT_2)
}

pub fn normal_cdf(z: f64) -> f64 {
    1.0 - normal_sf(z)
}

// ── Chi-square test of independence ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub dof:       usize,
    pub p_value:   f64,
}

/// Pearson chi-square on an r×k table of observed counts.
///
/// Returns None when the table is ragged or a row or column total is
/// zero (an expected count would be zero). A table with one row or one
/// column has dof 0 and yields statistic 0, p 1.
pub fn chi_square_contingency(observed: &[Vec<f64>]) -> Option<ChiSquare> {
    let rows = observed.len();
    let cols = observed.first()?.len();
    if cols == 0 || observed.iter().any(|r| r.len() != cols) {
        return None;
    }

    let row_totals: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..cols).map(|j| observed.iter().map(|r| r[j]).sum()).collect();
    let n: f64 = row_totals.iter().sum();
    if row_totals.iter().chain(&col_totals).any(|t| *t <= 0.0) {
        return None;
    }

    let dof = (rows - 1) * (cols - 1);
    if dof == 0 {
        return Some(ChiSquare { statistic: 0.0, dof, p_value: 1.0 });
    }

    let mut statistic = 0.0;
    for (i, row) in observed.iter().enumerate() {
        for (j, &obs) in row.iter().enumerate() {
            let expected = row_totals[i] * col_totals[j] / n;
            let mut diff = obs - expected;
            if dof == 1 {
                // Yates: shrink each deviation toward zero by up to ½.
                diff = diff.signum() * (diff.abs() - 0.5).max(0.0);
            }
            statistic += diff * diff / expected;
        }
    }

    Some(ChiSquare {
        statistic,
        dof,
        p_value: chi2_sf(statistic, dof as f64),
    })
}

// ── Mann-Whitney U ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MannWhitney {
    /// U of the first sample.
    pub statistic: f64,
    pub p_value:   f64,
}

/// Midranks (1-based) of `values`; tied values share the mean of the
/// ranks they span. Also returns Σ(t³ − t) over tie groups.
pub fn midranks(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i + 1;
        while j < order.len() && values[order[j]] == values[order[i]] {
            j += 1;
        }
        // Positions i..j (0-based) hold ranks i+1..=j.
        let rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            ranks[idx] = rank;
        }
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }
    (ranks, tie_term)
}

/// Two-sided Mann-Whitney U test of `x` against `y`.
/// None when either sample is empty.
pub fn mann_whitney_u(x: &[f64], y: &[f64]) -> Option<MannWhitney> {
    if x.is_empty() || y.is_empty() {
        return None;
    }
    let n1 = x.len() as f64;
    let n2 = y.len() as f64;
    let n = n1 + n2;

    let combined: Vec<f64> = x.iter().chain(y).copied().collect();
    let (ranks, tie_term) = midranks(&combined);
    let r1: f64 = ranks[..x.len()].iter().sum();

    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
    let u2 = n1 * n2 - u1;
    let mu = n1 * n2 / 2.0;

    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if !(variance > 0.0) {
        // Every observation tied: no evidence either way.
        return Some(MannWhitney { statistic: u1, p_value: 1.0 });
    }

    let z = (u1.max(u2) - mu - 0.5) / variance.sqrt();
    let p_value = (2.0 * normal_sf(z)).min(1.0);
    Some(MannWhitney { statistic: u1, p_value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-12));
    }

    #[test]
    fn chi2_critical_values() {
        assert!(close(chi2_sf(3.841_458_820_694_124, 1.0), 0.05, 1e-9));
        // df = 2 is exactly exp(-x/2).
        assert!(close(chi2_sf(5.991_464_547_107_979, 2.0), 0.05, 1e-9));
        assert!(close(chi2_sf(30.0, 2.0), (-15f64).exp(), 1e-12));
    }

    #[test]
    fn normal_tail_at_1_96() {
        assert!(close(normal_sf(1.959_963_984_540_054), 0.025, 1e-9));
        assert!(close(normal_sf(0.0), 0.5, 1e-12));
        assert!(close(normal_cdf(-1.959_963_984_540_054), 0.025, 1e-9));
    }

    #[test]
    fn yates_corrected_2x2() {
        let t = vec![vec![10.0, 20.0], vec![20.0, 10.0]];
        let r = chi_square_contingency(&t).unwrap();
        assert_eq!(r.dof, 1);
        assert!(close(r.statistic, 5.4, 1e-9));
        assert!(r.p_value > 0.019 && r.p_value < 0.021);
    }

    #[test]
    fn balanced_table_has_p_one() {
        let t = vec![vec![12.0, 12.0], vec![12.0, 12.0]];
        let r = chi_square_contingency(&t).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(close(r.p_value, 1.0, 1e-12));
    }

    #[test]
    fn uncorrected_2x3() {
        // Expected 10 everywhere; (5² + 0 + 5²)·2 / 10 = 10.
        let t = vec![vec![15.0, 10.0, 5.0], vec![5.0, 10.0, 15.0]];
        let r = chi_square_contingency(&t).unwrap();
        assert_eq!(r.dof, 2);
        assert!(close(r.statistic, 10.0, 1e-9));
        assert!(close(r.p_value, (-5f64).exp(), 1e-9));
    }

    #[test]
    fn zero_margin_is_none() {
        let t = vec![vec![0.0, 0.0], vec![4.0, 6.0]];
        assert!(chi_square_contingency(&t).is_none());
    }

    #[test]
    fn midranks_average_ties() {
        let (ranks, tie) = midranks(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(tie, 6.0);
    }

    #[test]
    fn separated_samples() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [6.0, 7.0, 8.0, 9.0, 10.0];
        let r = mann_whitney_u(&x, &y).unwrap();
        assert_eq!(r.statistic, 0.0);
        assert!(r.p_value > 0.011 && r.p_value < 0.013, "p = {}", r.p_value);
    }

    #[test]
    fn all_tied_has_p_one() {
        let r = mann_whitney_u(&[2.0; 4], &[2.0; 6]).unwrap();
        assert_eq!(r.statistic, 12.0);
        assert_eq!(r.p_value, 1.0);
    }
}
