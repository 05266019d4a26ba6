//! Evidence-to-opinion mapping.
//!
//! Re-derives trust degree and certainty from positive (`r`) and negative
//! (`s`) evidence counts.

/// Maps evidence counts to `(t, c)`.
///
/// Implementations must be monotone: more positive evidence never lowers
/// `t`, more evidence of either sign never lowers `c`.
pub trait EvidenceModel: Send + Sync {
    fn derive(&self, r: f64, s: f64) -> (f64, f64);
}

/// CertainTrust mapping parameterized by the convergence count `N`.
///
/// With `x = r + s` and weight `w`:
/// - `c = N·x / (2·w·(N − x) + N·x)` for `x < N`, else `1`
/// - `t = r / x`, or `0.5` without evidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CertainTrustModel {
    pub n: u32,
    pub weight: f64,
}

impl CertainTrustModel {
    pub const DEFAULT_WEIGHT: f64 = 2.0;

    pub fn new(n: u32) -> Self {
        Self {
            n: n.max(1),
            weight: Self::DEFAULT_WEIGHT,
        }
    }
}

impl Default for CertainTrustModel {
    fn default() -> Self {
        Self::new(10)
    }
}

impl EvidenceModel for CertainTrustModel {
    fn derive(&self, r: f64, s: f64) -> (f64, f64) {
        let x = r + s;
        if x <= 0.0 {
            return (0.5, 0.0);
        }

        let n = self.n as f64;
        let c = if x >= n {
            1.0
        } else {
            (n * x) / (2.0 * self.weight * (n - x) + n * x)
        };
        (r / x, c)
    }
}
