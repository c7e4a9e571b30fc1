use super::archive::StoredArtifact;
use ndarray::{ArrayViewD, Axis, Slice};
use std::fmt;

pub const RTOL: f64 = 1e-5;
pub const ATOL: f64 = 1e-8;

/// Verdict of comparing a produced artifact against its reference.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Every produced value matched.
    FullPass,
    /// The overlap matched, but the run produced more than the reference holds.
    PartialPass { compared: Vec<usize> },
    Fail { reason: String },
    /// No reference exists for this key.
    Missing,
}

impl CheckOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::FullPass | Self::PartialPass { .. })
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullPass => write!(f, "FULL PASS"),
            Self::PartialPass { compared } => write!(f, "PARTIAL PASS (compared {:?})", compared),
            Self::Fail { reason } => write!(f, "FAIL ({})", reason),
            Self::Missing => write!(f, "MISSING"),
        }
    }
}

fn fail(reason: impl Into<String>) -> CheckOutcome {
    CheckOutcome::Fail {
        reason: reason.into(),
    }
}

/// `|a - b| <= atol + rtol * |b|` for every element, `b` being the reference.
fn allclose(produced: &ArrayViewD<'_, f64>, reference: &ArrayViewD<'_, f64>) -> bool {
    produced
        .iter()
        .zip(reference.iter())
        .all(|(&a, &b)| (a - b).abs() <= ATOL + RTOL * b.abs())
}

/// Shared window of two shapes: identical except for at most one axis, which
/// is truncated to the shorter length. Returns the window and whether the
/// produced array extends past it.
fn overlap(produced: &[usize], reference: &[usize]) -> Result<(Vec<usize>, bool), String> {
    if produced.len() != reference.len() {
        return Err(format!(
            "dimension mismatch: produced {:?}, reference {:?}",
            produced, reference
        ));
    }
    let differing: Vec<usize> = (0..produced.len())
        .filter(|&i| produced[i] != reference[i])
        .collect();
    if differing.len() > 1 {
        return Err(format!(
            "shapes differ on more than one axis: produced {:?}, reference {:?}",
            produced, reference
        ));
    }
    let window: Vec<usize> = produced
        .iter()
        .zip(reference)
        .map(|(&p, &r)| p.min(r))
        .collect();
    let truncated = differing
        .first()
        .is_some_and(|&axis| produced[axis] > reference[axis]);
    Ok((window, truncated))
}

fn truncate<'a, T>(view: ArrayViewD<'a, T>, window: &[usize]) -> ArrayViewD<'a, T> {
    let mut view = view;
    for (axis, &len) in window.iter().enumerate() {
        view.slice_axis_inplace(Axis(axis), Slice::from(0..len));
    }
    view
}

fn verdict(matched: bool, window: Vec<usize>, truncated: bool) -> CheckOutcome {
    match (matched, truncated) {
        (false, _) => fail("values differ"),
        (true, true) => CheckOutcome::PartialPass { compared: window },
        (true, false) => CheckOutcome::FullPass,
    }
}

/// Compares a produced artifact against a reference one.
pub fn compare(produced: &StoredArtifact, reference: &StoredArtifact) -> CheckOutcome {
    match (produced, reference) {
        (StoredArtifact::Float(p), StoredArtifact::Float(r)) => {
            match overlap(p.shape(), r.shape()) {
                Ok((window, truncated)) => {
                    let p = truncate(p.view(), &window);
                    let r = truncate(r.view(), &window);
                    verdict(allclose(&p, &r), window, truncated)
                }
                Err(reason) => fail(reason),
            }
        }
        (StoredArtifact::Bool(p), StoredArtifact::Bool(r)) => {
            match overlap(p.shape(), r.shape()) {
                Ok((window, truncated)) => {
                    let p = truncate(p.view(), &window);
                    let r = truncate(r.view(), &window);
                    verdict(p == r, window, truncated)
                }
                Err(reason) => fail(reason),
            }
        }
        (StoredArtifact::Experiment(p), StoredArtifact::Experiment(r)) => {
            if p == r {
                CheckOutcome::FullPass
            } else {
                fail("experiment records differ")
            }
        }
        (p, r) => fail(format!(
            "kind mismatch: produced {}, reference {}",
            p.kind(),
            r.kind()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn, arr2};

    fn float(rows: &[[f64; 3]]) -> StoredArtifact {
        StoredArtifact::Float(arr2(rows).into_dyn())
    }

    #[test]
    fn identical_arrays_fully_pass() {
        let a = float(&[[0.1, 0.2, 0.3]]);
        assert_eq!(compare(&a, &a), CheckOutcome::FullPass);
    }

    #[test]
    fn values_within_tolerance_pass() {
        let produced = float(&[[1.0 + 5e-6, 0.0, 0.5]]);
        let reference = float(&[[1.0, 0.0, 0.5]]);
        assert_eq!(compare(&produced, &reference), CheckOutcome::FullPass);
    }

    #[test]
    fn differing_values_fail() {
        let produced = float(&[[0.1, 0.2, 0.4]]);
        let reference = float(&[[0.1, 0.2, 0.3]]);
        assert!(matches!(compare(&produced, &reference), CheckOutcome::Fail { .. }));
    }

    #[test]
    fn longer_produced_array_partially_passes_on_the_overlap() {
        let produced = StoredArtifact::Float(
            arr2(&[[0.1, 0.2, 0.3, 0.9], [0.4, 0.5, 0.6, 0.9]]).into_dyn(),
        );
        let reference = float(&[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]);
        assert_eq!(
            compare(&produced, &reference),
            CheckOutcome::PartialPass {
                compared: vec![2, 3]
            }
        );
    }

    #[test]
    fn shorter_produced_array_fully_passes_when_it_matches() {
        let produced = StoredArtifact::Float(arr2(&[[0.1, 0.2], [0.4, 0.5]]).into_dyn());
        let reference = float(&[[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]);
        assert_eq!(compare(&produced, &reference), CheckOutcome::FullPass);
    }

    #[test]
    fn shapes_differing_on_two_axes_fail() {
        let produced = StoredArtifact::Float(ArrayD::zeros(IxDyn(&[3, 4])));
        let reference = StoredArtifact::Float(ArrayD::zeros(IxDyn(&[2, 3])));
        assert!(matches!(compare(&produced, &reference), CheckOutcome::Fail { .. }));
    }

    #[test]
    fn kind_mismatch_fails() {
        let produced = StoredArtifact::Bool(ArrayD::from_elem(IxDyn(&[1, 3]), true));
        let reference = float(&[[1.0, 1.0, 1.0]]);
        assert!(matches!(compare(&produced, &reference), CheckOutcome::Fail { .. }));
    }

    #[test]
    fn bool_arrays_compare_exactly() {
        let on = StoredArtifact::Bool(ArrayD::from_elem(IxDyn(&[2, 2]), true));
        let off = StoredArtifact::Bool(ArrayD::from_elem(IxDyn(&[2, 2]), false));
        assert_eq!(compare(&on, &on), CheckOutcome::FullPass);
        assert!(!compare(&on, &off).is_pass());
    }

    #[test]
    fn outcome_labels_match_report_vocabulary() {
        assert_eq!(CheckOutcome::FullPass.to_string(), "FULL PASS");
        assert_eq!(CheckOutcome::Missing.to_string(), "MISSING");
        assert!(fail("x").to_string().starts_with("FAIL"));
        assert!(
            CheckOutcome::PartialPass { compared: vec![1] }
                .to_string()
                .starts_with("PARTIAL PASS")
        );
    }
}
