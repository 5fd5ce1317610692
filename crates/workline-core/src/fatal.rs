//! Unrecoverable failure path.
//!
//! Recoverable failures return [`crate::Error`]. Broken invariants and
//! faulting jobs come here instead: the failure is logged and the process
//! aborts. Nothing on this path unwinds, so it cannot be caught.
//!
//! No debugger break is issued before aborting; stable Rust has no portable
//! breakpoint intrinsic, and an attached debugger stops on the abort signal.

use std::fmt;

/// Build the diagnostic logged for a broken invariant.
#[must_use]
pub fn describe_violation(
    file: &str,
    line: u32,
    module: &str,
    expression: &str,
    message: fmt::Arguments<'_>,
) -> String {
    let message = message.to_string();
    let mut report = String::from("Invariant violated");
    if !message.is_empty() {
        report.push_str("\nMessage: ");
        report.push_str(&message);
    }
    report.push_str(&format!(
        "\nFile: {file}\nLine: {line}\nModule: {module}\nExpression: {expression}"
    ));
    report
}

/// Log `report` and abort the process.
#[cold]
#[inline(never)]
pub fn abort_with(report: &str) -> ! {
    tracing::error!("{report}");
    // The subscriber may not be installed yet, or may buffer.
    eprintln!("ERROR: {report}");
    std::process::abort()
}

/// Report a broken invariant and abort. Called through [`invariant!`](crate::invariant).
#[cold]
#[inline(never)]
pub fn invariant_violation(
    file: &str,
    line: u32,
    module: &str,
    expression: &str,
    message: fmt::Arguments<'_>,
) -> ! {
    abort_with(&describe_violation(file, line, module, expression, message))
}

/// Abort the process if `cond` does not hold.
///
/// ```ignore
/// invariant!(frequency != 0, "clock frequency must be non-zero");
/// ```
#[macro_export]
macro_rules! invariant {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::fatal::invariant_violation(
                file!(),
                line!(),
                module_path!(),
                stringify!($cond),
                format_args!(""),
            )
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fatal::invariant_violation(
                file!(),
                line!(),
                module_path!(),
                stringify!($cond),
                format_args!($($arg)+),
            )
        }
    };
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    /// Set in the child process spawned by `broken_invariant_aborts_the_process`.
    const CHILD_ENV: &str = "WORKLINE_FATAL_CHILD";

    #[test]
    fn report_names_location_and_expression() {
        let report = describe_violation(
            "src/queue.rs",
            42,
            "workline_jobs::queue",
            "pending > 0",
            format_args!("counter underflow on {}", "render"),
        );
        assert!(report.starts_with("Invariant violated\nMessage: counter underflow on render"));
        assert!(report.contains("\nFile: src/queue.rs"));
        assert!(report.contains("\nLine: 42"));
        assert!(report.contains("\nModule: workline_jobs::queue"));
        assert!(report.ends_with("\nExpression: pending > 0"));
    }

    #[test]
    fn report_without_message() {
        let report = describe_violation("a.rs", 1, "m", "x", format_args!(""));
        assert!(!report.contains("Message"));
    }

    #[test]
    fn holding_invariant_is_silent() {
        let value = 3;
        invariant!(value == 3);
        invariant!(value > 0, "value was {}", value);
    }

    #[test]
    fn broken_invariant_aborts_the_process() {
        if std::env::var_os(CHILD_ENV).is_some() {
            let pending = 0;
            invariant!(pending > 0, "pending was {}", pending);
            return;
        }

        let output = Command::new(std::env::current_exe().unwrap())
            .args([
                "--exact",
                "fatal::tests::broken_invariant_aborts_the_process",
                "--nocapture",
            ])
            .env(CHILD_ENV, "1")
            .output()
            .unwrap();

        assert!(!output.status.success());
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            // SIGABRT, not a test failure exit code.
            assert_eq!(output.status.signal(), Some(6));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Invariant violated\nMessage: pending was 0"), "stderr: {stderr}");
        assert!(stderr.contains("Expression: pending > 0"), "stderr: {stderr}");
    }
}
