//! A Cartesian-product index over an expanded request's axis values.
//!
//! Grounded in `HyperCube.cc`: one axis per populated keyword (in the
//! grammar's declared axis order), a dense flag per cell recording whether
//! it is still "set" (outstanding), and a minimal-cover reconstruction
//! (`aggregated_requests`) that merges adjacent cube slices back into a
//! small number of covering requests instead of emitting one request per
//! cell.
//!
//! `count()`/`count_vacant()` are deliberately *not* a literal port: the
//! original's `countVacant()` returns the same counter as `count()` (a
//! copy-paste bug — both read `count_`, which only ever tracks "still set"
//! cells). Here `count_vacant()` is `size() - count()`, which is what every
//! caller of `countVacant()` actually needs.

use std::collections::BTreeMap;

use fixedbitset::FixedBitSet;

use crate::error::MarsError;
use crate::request::Request;

struct Axis {
    name: String,
    values: Vec<String>,
}

impl Axis {
    fn index_of(&self, v: &str) -> Option<usize> {
        self.values.iter().position(|x| x == v)
    }
}

/// The indexed Cartesian product of one request's populated axes.
pub struct HyperCube {
    verb: String,
    axes: Vec<Axis>,
    strides: Vec<usize>,
    size: usize,
    set: FixedBitSet,
    count: usize,
}

impl HyperCube {
    /// Build the cube from `request`'s populated keywords, restricted to
    /// and ordered by `axis_order` (a verb's grammar declaration order).
    pub fn new(axis_order: &[String], request: &Request) -> Self {
        let mut axes = Vec::new();
        for name in axis_order {
            if let Ok(values) = request.values(name, true) {
                if !values.is_empty() {
                    axes.push(Axis {
                        name: name.clone(),
                        values: values.to_vec(),
                    });
                }
            }
        }

        let mut strides = vec![1usize; axes.len()];
        for i in (0..axes.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * axes[i + 1].values.len();
        }
        let size = axes.iter().map(|a| a.values.len()).product::<usize>();

        HyperCube {
            verb: request.verb().to_string(),
            axes,
            strides,
            size,
            set: FixedBitSet::with_capacity(size).tap_set_all(size),
            count: size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells still marked outstanding.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Cells cleared so far — `size() - count()`, see the module doc.
    pub fn count_vacant(&self) -> usize {
        self.size - self.count
    }

    pub fn contains(&self, r: &Request) -> bool {
        matches!(self.index_of(r), Ok(Some(idx)) if self.set.contains(idx))
    }

    /// Clear the cell matching `r`. Returns `false` if `r` doesn't address a
    /// cell of this cube or the cell was already cleared.
    pub fn clear(&mut self, r: &Request) -> bool {
        let Ok(Some(idx)) = self.index_of(r) else { return false };
        if !self.set.contains(idx) {
            return false;
        }
        self.set.set(idx, false);
        self.count -= 1;
        true
    }

    fn index_of(&self, r: &Request) -> Result<Option<usize>, MarsError> {
        let mut idx = 0usize;
        for (axis, stride) in self.axes.iter().zip(&self.strides) {
            let values = r.values(&axis.name, true)?;
            if values.is_empty() {
                return Err(MarsError::ConstraintViolation {
                    keyword: axis.name.clone(),
                    reason: "no value given for a hypercube axis".to_string(),
                });
            }
            if values.len() > 1 {
                return Err(MarsError::ConstraintViolation {
                    keyword: axis.name.clone(),
                    reason: "too many values given for a hypercube axis".to_string(),
                });
            }
            let Some(coord) = axis.index_of(&values[0]) else { return Ok(None) };
            idx += coord * stride;
        }
        Ok(Some(idx))
    }

    fn coordinates(&self, idx: usize) -> Vec<usize> {
        self.strides
            .iter()
            .zip(self.axes.iter())
            .map(|(stride, axis)| (idx / stride) % axis.values.len())
            .collect()
    }

    fn request_of(&self, idx: usize) -> Request {
        let coords = self.coordinates(idx);
        let mut request = Request::new(&self.verb);
        for (axis, coord) in self.axes.iter().zip(coords) {
            request.set_value(&axis.name, axis.values[coord].clone());
        }
        request
    }

    /// The minimal-cover reconstruction of the cells still outstanding
    /// (still-set bits) — what a caller still needs to retrieve. Matches the
    /// original's `vacantRequests()` worked example: clearing one cell out of
    /// a 2x2 cube leaves an L-shaped remainder that needs two requests to
    /// cover.
    pub fn vacant_requests(&self) -> Vec<Request> {
        self.aggregated_requests(true)
    }

    /// The minimal set of requests covering `remaining` (still-set, if
    /// `true`) or cleared (if `false`) cells, merging adjacent cube slices
    /// into ranges rather than emitting one request per cell.
    pub fn aggregated_requests(&self, remaining: bool) -> Vec<Request> {
        let want_vacant = !remaining;
        if (want_vacant && self.count_vacant() == 0) || (!want_vacant && self.count() == 0) {
            return Vec::new();
        }

        let idxs: Vec<usize> = (0..self.size)
            .filter(|&i| self.set.contains(i) == remaining)
            .collect();

        self.request(&idxs).into_iter().map(|(req, _)| req).collect()
    }

    /// Recursively split `idxs` along the axis that yields the fewest
    /// slices, then merge embedded/adjacent sub-requests back together.
    fn request(&self, idxs: &[usize]) -> Vec<(Request, usize)> {
        if idxs.len() <= 1 {
            return idxs.iter().map(|&i| (self.request_of(i), 1)).collect();
        }

        let idx_set: std::collections::BTreeSet<usize> = idxs.iter().copied().collect();
        let axis = self.pick_best_axis(&idx_set);
        let slices = self.slice_along_axis(&idx_set, axis);

        let mut result: Vec<(Request, usize)> = Vec::new();
        for sub_idxs in slices.values() {
            let sub: Vec<usize> = sub_idxs.iter().copied().collect();
            result.extend(self.request(&sub));
            while self.merge_last(&mut result) {}
        }
        result
    }

    fn slice_along_axis(
        &self,
        idxs: &std::collections::BTreeSet<usize>,
        axis: usize,
    ) -> BTreeMap<usize, std::collections::BTreeSet<usize>> {
        let mut slices: BTreeMap<usize, std::collections::BTreeSet<usize>> = BTreeMap::new();
        for &idx in idxs {
            let coords = self.coordinates(idx);
            slices.entry(coords[axis]).or_default().insert(idx);
        }
        slices
    }

    fn pick_best_axis(&self, idxs: &std::collections::BTreeSet<usize>) -> usize {
        let mut best_axis = 0;
        let mut best_n = usize::MAX;
        for axis in 0..self.axes.len() {
            let n = self.slice_along_axis(idxs, axis).len();
            if n > 1 && n < best_n {
                best_axis = axis;
                best_n = n;
            }
        }
        best_axis
    }

    /// Product, over every axis, of the number of distinct values `a` and
    /// `b` would jointly occupy once merged — i.e. the size of the smallest
    /// sub-cube enclosing both requests.
    fn merged_span(&self, a: &Request, b: &Request) -> usize {
        let mut merged = a.clone();
        merged.merge(b);
        self.axes
            .iter()
            .map(|axis| merged.values(&axis.name, true).map(|v| v.len()).unwrap_or(0))
            .product()
    }

    /// `a` (of size `a_size`) is embedded in `b` if merging leaves `b`'s
    /// span unchanged; adjacent if the merged span equals the sum of their
    /// sizes (they tile a larger sub-cube with no gaps); otherwise disjoint.
    fn relation(&self, a: &Request, a_size: usize, b: &Request, b_size: usize) -> Relation {
        let span = self.merged_span(a, b);
        if span == b_size {
            Relation::Embedded
        } else if span == a_size + b_size {
            Relation::Adjacent
        } else {
            Relation::Disjoint
        }
    }

    /// Try to fold the last entry of `requests` into an earlier one.
    /// Returns `true` only when a merge actually happened and the result was
    /// adjacent (as opposed to already embedded, which just drops the
    /// redundant last entry without signalling a merge).
    fn merge_last(&self, requests: &mut Vec<(Request, usize)>) -> bool {
        let Some((last_req, last_size)) = requests.last().cloned() else { return false };
        let prior_len = requests.len() - 1;

        let mut best: Option<(usize, usize)> = None; // (index, combined size)
        for j in 0..prior_len {
            let (req, size) = &requests[j];
            match self.relation(req, *size, &last_req, last_size) {
                Relation::Embedded => {
                    requests.pop();
                    return false;
                }
                Relation::Adjacent => {
                    let combined = size + last_size;
                    if best.is_none_or(|(_, best_size)| combined > best_size) {
                        best = Some((j, combined));
                    }
                }
                Relation::Disjoint => {}
            }
        }

        match best {
            Some((j, combined)) => {
                requests[j].0.merge(&last_req);
                requests[j].1 = combined;
                requests.pop();
                true
            }
            None => false,
        }
    }
}

enum Relation {
    Embedded,
    Adjacent,
    Disjoint,
}

trait TapSetAll {
    fn tap_set_all(self, n: usize) -> Self;
}

impl TapSetAll for FixedBitSet {
    fn tap_set_all(mut self, n: usize) -> Self {
        for i in 0..n {
            self.insert(i);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        vec!["levelist".to_string(), "param".to_string()]
    }

    fn base_request() -> Request {
        let mut r = Request::new("retrieve");
        r.set_values("levelist", vec!["1".into(), "2".into(), "3".into()]);
        r.set_values("param", vec!["129".into(), "130".into()]);
        r
    }

    #[test]
    fn size_is_the_cartesian_product_of_axis_cardinalities() {
        let cube = HyperCube::new(&order(), &base_request());
        assert_eq!(cube.size(), 6);
        assert_eq!(cube.count(), 6);
        assert_eq!(cube.count_vacant(), 0);
    }

    #[test]
    fn clearing_a_cell_moves_it_from_count_to_vacant() {
        let mut cube = HyperCube::new(&order(), &base_request());
        let mut single = Request::new("retrieve");
        single.set_value("levelist", "2");
        single.set_value("param", "130");
        assert!(cube.clear(&single));
        assert_eq!(cube.count(), 5);
        assert_eq!(cube.count_vacant(), 1);
        assert!(!cube.contains(&single));
    }

    #[test]
    fn clearing_twice_is_a_no_op_the_second_time() {
        let mut cube = HyperCube::new(&order(), &base_request());
        let mut single = Request::new("retrieve");
        single.set_value("levelist", "1");
        single.set_value("param", "129");
        assert!(cube.clear(&single));
        assert!(!cube.clear(&single));
        assert_eq!(cube.count_vacant(), 1);
    }

    #[test]
    fn unset_cell_reports_not_contained() {
        let mut cube = HyperCube::new(&order(), &base_request());
        let mut single = Request::new("retrieve");
        single.set_value("levelist", "3");
        single.set_value("param", "129");
        cube.clear(&single);

        let mut unknown = Request::new("retrieve");
        unknown.set_value("levelist", "99");
        unknown.set_value("param", "129");
        assert!(!cube.contains(&unknown));
    }

    /// Mirrors the original's worked `vacantRequests()` example: a 2x2 cube,
    /// clearing one corner leaves an L-shaped remainder needing exactly two
    /// covering requests; clearing a second, adjacent corner collapses it
    /// back down to one.
    #[test]
    fn vacant_requests_reconstructs_minimal_cover_of_an_l_shaped_remainder() {
        let mut r = Request::new("retrieve");
        r.set_values("levelist", vec!["500".into(), "600".into()]);
        r.set_values("param", vec!["138".into(), "155".into()]);
        let mut cube = HyperCube::new(&order(), &r);
        assert_eq!(cube.size(), 4);

        let mut r500_138 = Request::new("retrieve");
        r500_138.set_value("levelist", "500");
        r500_138.set_value("param", "138");
        assert!(cube.clear(&r500_138));
        assert_eq!(cube.count_vacant(), 1);

        let remaining = cube.vacant_requests();
        assert_eq!(remaining.len(), 2);

        let mut r600_138 = Request::new("retrieve");
        r600_138.set_value("levelist", "600");
        r600_138.set_value("param", "138");
        assert!(cube.clear(&r600_138));
        assert_eq!(cube.count_vacant(), 2);

        let remaining = cube.vacant_requests();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].values("levelist", false).unwrap(), &["500", "600"]);
        assert_eq!(remaining[0].values("param", false).unwrap(), &["155"]);
    }
}
