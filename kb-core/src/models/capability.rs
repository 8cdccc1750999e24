/// The six optional engine features probed once per pool and cached for the
/// pool's lifetime. Immutable once `checked` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityVector {
    pub has_vector_top_k: bool,
    pub has_fts: bool,
    pub has_json: bool,
    pub has_vector_idx: bool,
    pub has_rtree: bool,
    pub has_extensions: bool,
    pub checked: bool,
}

impl CapabilityVector {
    pub fn unchecked() -> Self {
        Self::default()
    }
}
