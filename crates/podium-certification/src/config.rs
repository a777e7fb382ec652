/// Tunables shared by the workflow services
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Longest accepted removal / rejection reason, after trimming
    pub max_reason_len: usize,
    /// Reject reasons that are only whitespace once trimmed
    pub require_trimmed_reason: bool,
    /// Longest accepted score comment
    pub max_comment_len: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_reason_len: 2000,
            require_trimmed_reason: true,
            max_comment_len: 1000,
        }
    }
}
