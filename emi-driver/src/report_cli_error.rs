// SPDX-License-Identifier: Apache-2.0

use colored::Colorize;

use crate::error::{EmiError, StepFailure};

pub fn report_cli_error_and_exit(
    message: &str,
    step: Option<&str>,
    details: Vec<(&str, &str)>,
) -> ! {
    let step_str = if let Some(step) = step {
        format!("{}: ", step)
    } else {
        String::new()
    };
    eprintln!("emi-driver: {}{}", step_str, message.red().bold());
    for (key, value) in details {
        eprintln!("  {}: {}", key, value);
    }
    std::process::exit(1);
}

/// Key/value pairs worth showing beneath the headline of `error`.
pub fn error_details(error: &EmiError) -> Vec<(&'static str, String)> {
    match error {
        EmiError::ExternalToolFailure {
            command,
            status,
            stdout,
            stderr,
        } => {
            let mut details = vec![("command", command.clone())];
            if let Some(status) = status {
                details.push(("status", status.to_string()));
            }
            if !stdout.trim().is_empty() {
                details.push(("stdout", stdout.trim_end().to_string()));
            }
            if !stderr.trim().is_empty() {
                details.push(("stderr", stderr.trim_end().to_string()));
            }
            details
        }
        EmiError::Interrupted { command } => vec![("command", command.clone())],
        EmiError::Io { source, .. } => vec![("cause", source.to_string())],
        _ => Vec::new(),
    }
}

pub fn report_step_failure_and_exit(failure: &StepFailure) -> ! {
    let step = failure.step.to_string();
    let details = error_details(&failure.source);
    report_cli_error_and_exit(
        &failure.source.to_string(),
        Some(&step),
        details.iter().map(|(k, v)| (*k, v.as_str())).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tool_failure_details_skip_empty_streams() {
        let error = EmiError::ExternalToolFailure {
            command: "run /reg --dump-lib x --output y".to_string(),
            status: Some(3),
            stdout: "  \n".to_string(),
            stderr: "Exception in thread \"main\"\n".to_string(),
        };
        assert_eq!(
            error_details(&error),
            vec![
                ("command", "run /reg --dump-lib x --output y".to_string()),
                ("status", "3".to_string()),
                ("stderr", "Exception in thread \"main\"".to_string()),
            ]
        );
    }

    #[test]
    fn configuration_errors_have_no_details() {
        let error = EmiError::configuration("/proj/lib/jacococli.jar", None);
        assert!(error_details(&error).is_empty());
    }
}
