//! ── Execution Outcome ──────────────────────────────────────────────────────

/// Uniform result of any external-script invocation made by the Executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success,
    Failure { exit_code: i32 },
}

impl ExecutionOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, ExecutionOutcome::Success)
    }

    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            ExecutionOutcome::Success
        } else {
            ExecutionOutcome::Failure { exit_code: code }
        }
    }
}
