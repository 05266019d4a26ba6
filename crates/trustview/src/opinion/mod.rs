//! Opinion algebra — uncertain trust values and their combination.
//!
//! An [`Opinion`] is a trust judgment `(t, c, f)` backed by evidence
//! counters `(r, s)`:
//! - `t` trust degree
//! - `c` certainty, 0 meaning no evidence
//! - `f` base rate (prior)
//!
//! Evidence accrual re-derives `(t, c)` from `(r, s)` through an
//! [`EvidenceModel`]. Chains of issuer-trust opinions are combined with
//! [`Opinion::and`] and folded with [`fold_and`].

pub mod evidence;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustViewError};

pub use evidence::{CertainTrustModel, EvidenceModel};

// ---------------------------------------------------------------------------
// Opinion
// ---------------------------------------------------------------------------

/// Combined certainty at or below this magnitude is treated as 0.
pub const CERTAINTY_EPSILON: f64 = 1e-12;

/// A trust judgment with its supporting evidence counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    pub t: f64,
    pub c: f64,
    pub f: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub s: f64,
}

impl Opinion {
    /// Create an opinion with no evidence counters.
    ///
    /// # Errors
    ///
    /// Returns `TrustViewError::InvalidOpinion` if `t`, `c` or `f` lies
    /// outside `[0, 1]` or is not a number.
    pub fn new(t: f64, c: f64, f: f64) -> Result<Self> {
        for (name, value) in [("t", t), ("c", c), ("f", f)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TrustViewError::InvalidOpinion(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(Self {
            t,
            c,
            f,
            r: 0.0,
            s: 0.0,
        })
    }

    /// An opinion without any evidence: `(0.5, 0, f)`.
    ///
    /// `f` is clamped into `[0, 1]`.
    pub fn vacuous(f: f64) -> Self {
        Self {
            t: 0.5,
            c: 0.0,
            f: clamp_unit(f),
            r: 0.0,
            s: 0.0,
        }
    }

    /// The fully certain, fully trusted opinion `(1, 1, 1)`.
    pub fn certain() -> Self {
        Self {
            t: 1.0,
            c: 1.0,
            f: 1.0,
            r: 0.0,
            s: 0.0,
        }
    }

    /// Whether `(t, c, f)` is exactly `(1, 1, 1)`.
    pub fn is_certain(&self) -> bool {
        self.t == 1.0 && self.c == 1.0 && self.f == 1.0
    }

    /// Scalar point estimate `t·c + f·(1 − c)`.
    pub fn expectation(&self) -> f64 {
        self.t * self.c + self.f * (1.0 - self.c)
    }

    /// Conjunction of two independent opinions.
    ///
    /// The result carries no evidence counters. A base-rate product of
    /// exactly 1 zeroes the correction terms (both numerators contain a
    /// `1 − f` factor), and zero certainty yields `t = 0.5`. Certainty
    /// below [`CERTAINTY_EPSILON`] is round-off and reads as zero.
    pub fn and(&self, other: &Opinion) -> Opinion {
        let (ta, ca, fa) = (self.t, self.c, self.f);
        let (tb, cb, fb) = (other.t, other.c, other.f);

        let f = fa * fb;
        let denominator = 1.0 - f;

        let c_correction = if denominator == 0.0 {
            0.0
        } else {
            ((1.0 - ca) * cb * (1.0 - fa) * tb + ca * (1.0 - cb) * (1.0 - fb) * ta) / denominator
        };
        let c = ca + cb - ca * cb - c_correction;
        let c = if c.abs() < CERTAINTY_EPSILON {
            0.0
        } else {
            clamp_unit(c)
        };

        let t = if c == 0.0 {
            0.5
        } else {
            let t_correction = if denominator == 0.0 {
                0.0
            } else {
                (ca * (1.0 - cb) * (1.0 - fa) * fb * ta + (1.0 - ca) * cb * fa * (1.0 - fb) * tb)
                    / denominator
            };
            clamp_unit((ca * cb * ta * tb + t_correction) / c)
        };

        Opinion {
            t,
            c,
            f: clamp_unit(f),
            r: 0.0,
            s: 0.0,
        }
    }

    /// Add `n` units of positive evidence and re-derive `(t, c)`.
    pub fn add_positive(&mut self, n: f64, model: &dyn EvidenceModel) {
        self.r += n.max(0.0);
        self.rederive(model);
    }

    /// Add `n` units of negative evidence and re-derive `(t, c)`.
    pub fn add_negative(&mut self, n: f64, model: &dyn EvidenceModel) {
        self.s += n.max(0.0);
        self.rederive(model);
    }

    fn rederive(&mut self, model: &dyn EvidenceModel) {
        let (t, c) = model.derive(self.r, self.s);
        self.t = clamp_unit(t);
        self.c = clamp_unit(c);
    }
}

impl std::fmt::Display for Opinion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(t={:.3}, c={:.3}, f={:.3}, r={}, s={})",
            self.t, self.c, self.f, self.r, self.s
        )
    }
}

/// Left fold of [`Opinion::and`] over a chain. `None` for an empty chain.
pub fn fold_and<'a, I>(opinions: I) -> Option<Opinion>
where
    I: IntoIterator<Item = &'a Opinion>,
{
    let mut iter = opinions.into_iter();
    let first = *iter.next()?;
    Some(iter.fold(first, |acc, next| acc.and(next)))
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Key legitimacy
// ---------------------------------------------------------------------------

/// Optional opinion that a key legitimately belongs to a CA.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "opinion", rename_all = "snake_case")]
pub enum KeyLegitimacy {
    Present(Opinion),
    #[default]
    Absent,
}

impl KeyLegitimacy {
    /// Whether the key is unconditionally anchored, i.e. `Present((1,1,1))`.
    pub fn is_anchored(&self) -> bool {
        matches!(self, KeyLegitimacy::Present(o) if o.is_certain())
    }

    pub fn opinion(&self) -> Option<&Opinion> {
        match self {
            KeyLegitimacy::Present(o) => Some(o),
            KeyLegitimacy::Absent => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
