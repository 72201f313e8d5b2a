// ---------------------------------------------------------------------------
// Vector math helpers -- pure functions over term vectors
// ---------------------------------------------------------------------------

use crate::term_vec::TermVec;

/// `Σ u[t]·v[t]` over the intersection of `u` and `v`'s keys.
pub fn dot(u: &TermVec, v: &TermVec) -> f64 {
	let mut val = 0.0;
	for (term, uf) in u {
		if let Some(vf) = v.get(term) {
			val += (*uf as f64) * (*vf as f64);
		}
	}
	val
}

/// L2 norm of a term vector.
pub fn l2_norm(v: &TermVec) -> f64 {
	v.values().map(|f| (*f as f64).powi(2)).sum::<f64>().sqrt()
}

/// Magnitude of the multiset union of `a` and `b`.
pub fn mag_union(a: &TermVec, b: &TermVec) -> u64 {
	let sum_a: u64 = a.values().map(|f| *f as u64).sum();
	let sum_b: u64 = b.values().map(|f| *f as u64).sum();
	sum_a + sum_b
}

/// Magnitude of the multiset intersection of `a` and `b`.
pub fn mag_intersect(a: &TermVec, b: &TermVec) -> u64 {
	let mut val = 0u64;
	for (term, af) in a {
		if let Some(bf) = b.get(term) {
			val += (*af).min(*bf) as u64;
		}
	}
	val
}

/// Cosine similarity. Undefined (caller must avoid) when either vector has
/// zero norm; this returns `0.0` in that case rather than dividing by zero.
pub fn cosine(u: &TermVec, v: &TermVec) -> f64 {
	let denom = l2_norm(u) * l2_norm(v);
	if denom == 0.0 {
		return 0.0;
	}
	dot(u, v) / denom
}

/// Jaccard similarity over multisets.
pub fn jaccard(a: &TermVec, b: &TermVec) -> f64 {
	let union = mag_union(a, b);
	if union == 0 {
		return 0.0;
	}
	mag_intersect(a, b) as f64 / union as f64
}
