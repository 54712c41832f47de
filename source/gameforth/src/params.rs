use serde::{Deserialize, Serialize};

/// Sizing and limits for a [`Forth`](crate::Forth) VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForthParams {
    pub data_stack_elems: usize,
    pub return_stack_elems: usize,
    /// Size of the byte memory holding compiled code and data.
    pub memory_bytes: usize,
    pub output_buf_elems: usize,
    /// Maximum instructions a single top-level call may dispatch.
    ///
    /// `None` disables the limit.
    pub step_budget: Option<u64>,
}

impl ForthParams {
    pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;
}

impl Default for ForthParams {
    fn default() -> Self {
        Self {
            data_stack_elems: 256,
            return_stack_elems: 256,
            memory_bytes: 64 * 1024,
            output_buf_elems: 4096,
            step_budget: Some(Self::DEFAULT_STEP_BUDGET),
        }
    }
}
