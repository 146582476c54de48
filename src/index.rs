use crate::var::VarSet;

/// Cursor that walks the joint states of a superset of variables in linear
/// order and yields, for each of them, the linear index of the induced
/// joint state of a subset.
///
/// Both index spaces follow the code of [`VarSet::calc_state`], so the
/// cursor only needs, per superset variable, its state count and its
/// stride inside the subset (zero when the variable is not a member).
/// Construction is linear in the number of superset variables and each
/// advance is amortized constant time through the carry counters.
///
/// The cursor is frequently materialized into a table with `collect()`;
/// the table is then indexed by the superset's linear states.
#[derive(Debug, Clone)]
pub struct IndexFor {
    index: usize,
    state: Vec<usize>,
    ranges: Vec<usize>,
    strides: Vec<usize>,
    done: bool,
}

impl IndexFor {
    /// Builds the cursor for `sub` inside `sup`. `sub` must be contained
    /// in `sup`.
    pub fn new(sub: &VarSet, sup: &VarSet) -> Self {
        assert!(sub.is_subset_of(sup), "IndexFor needs sub to be contained in sup");
        let mut ranges = Vec::with_capacity(sup.len());
        let mut strides = Vec::with_capacity(sup.len());
        let mut sub_stride = 1;
        let mut sub_it = sub.iter().peekable();
        for v in sup.iter() {
            ranges.push(v.states());
            if sub_it.peek().copied() == Some(v) {
                strides.push(sub_stride);
                sub_stride *= v.states();
                sub_it.next();
            } else {
                strides.push(0);
            }
        }
        Self {
            index: 0,
            state: vec![0; ranges.len()],
            ranges,
            strides,
            done: false,
        }
    }

    /// Restarts the cursor at the first joint state.
    pub fn reset(&mut self) {
        self.index = 0;
        self.state.iter_mut().for_each(|s| *s = 0);
        self.done = false;
    }
}

impl Iterator for IndexFor {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.done {
            return None;
        }
        let cur = self.index;
        self.done = true;
        for k in 0..self.ranges.len() {
            self.index += self.strides[k];
            self.state[k] += 1;
            if self.state[k] < self.ranges[k] {
                self.done = false;
                break;
            }
            // digit overflow, carry into the next dimension
            self.index -= self.strides[k] * self.ranges[k];
            self.state[k] = 0;
        }
        Some(cur)
    }
}
