/// Classification of an analyzer failure (§4.4, §7). Only the two
/// `Retryable*` variants re-enter the backoff loop; everything else
/// exits it immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RetryableTransient,
    RetryableResource,
    PermanentInput,
    PermanentConfig,
    Unknown,
}

impl FailureClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureClass::RetryableTransient | FailureClass::RetryableResource)
    }
}

/// What the subprocess did, before classification (§4.4).
pub enum ProcessOutcome {
    /// Exited with a non-zero status.
    NonZeroExit { code: Option<i32>, stderr: String },
    /// Exceeded the per-job deadline.
    TimedOut,
    /// Exited 0 but stdout did not parse as a node document.
    ParseFailure(String),
}

/// Map a process outcome to a retry decision (§4.4). This is a simple
/// heuristic over exit codes and stderr text; a real analyzer would
/// document its own exit code contract, but none is specified
/// upstream, so the mapping below covers the common POSIX cases.
pub fn classify(outcome: &ProcessOutcome) -> FailureClass {
    match outcome {
        ProcessOutcome::TimedOut => FailureClass::RetryableTransient,
        ProcessOutcome::ParseFailure(_) => FailureClass::PermanentInput,
        ProcessOutcome::NonZeroExit { code, stderr } => {
            let stderr_lower = stderr.to_lowercase();
            if stderr_lower.contains("rate limit") || stderr_lower.contains("timeout") || stderr_lower.contains("connection") {
                return FailureClass::RetryableTransient;
            }
            if stderr_lower.contains("out of memory") || stderr_lower.contains("no space left") {
                return FailureClass::RetryableResource;
            }
            if stderr_lower.contains("missing prompt") || stderr_lower.contains("missing skill") || stderr_lower.contains("missing credential") {
                return FailureClass::PermanentConfig;
            }
            if stderr_lower.contains("malformed") || stderr_lower.contains("oversized") {
                return FailureClass::PermanentInput;
            }
            match code {
                // Convention: 124 is the shell's timeout(1) exit code.
                Some(124) => FailureClass::RetryableTransient,
                _ => FailureClass::Unknown,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable_transient() {
        assert_eq!(classify(&ProcessOutcome::TimedOut), FailureClass::RetryableTransient);
    }

    #[test]
    fn parse_failure_is_permanent_input() {
        assert_eq!(
            classify(&ProcessOutcome::ParseFailure("not json".into())),
            FailureClass::PermanentInput
        );
    }

    #[test]
    fn rate_limit_stderr_is_retryable_transient() {
        let outcome = ProcessOutcome::NonZeroExit { code: Some(1), stderr: "rate limit exceeded".into() };
        assert_eq!(classify(&outcome), FailureClass::RetryableTransient);
    }

    #[test]
    fn missing_prompt_is_permanent_config() {
        let outcome = ProcessOutcome::NonZeroExit { code: Some(2), stderr: "missing prompt file".into() };
        assert_eq!(classify(&outcome), FailureClass::PermanentConfig);
    }

    #[test]
    fn unrecognized_failure_is_unknown() {
        let outcome = ProcessOutcome::NonZeroExit { code: Some(1), stderr: "".into() };
        assert_eq!(classify(&outcome), FailureClass::Unknown);
    }
}
