use std::process::ExitCode;

use wizard_core::requirements::RequirementResult;
use wizard_core::WizardError;

#[derive(Debug)]
pub enum CliError {
    Requirement(Vec<RequirementResult>),
    Parse(String),
    Runtime(String),
    Io(String),
    Cancelled(Option<String>),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Requirement(_) => ExitCode::from(1),
            CliError::Parse(_) => ExitCode::from(2),
            CliError::Runtime(_) => ExitCode::from(3),
            CliError::Io(_) => ExitCode::from(4),
            CliError::Cancelled(_) => ExitCode::from(5),
        }
    }

    /// Short machine-readable status for JSON output.
    pub fn status(&self) -> &'static str {
        match self {
            CliError::Requirement(_) => "requirements_not_met",
            CliError::Parse(_) => "parse_error",
            CliError::Runtime(_) => "runtime_error",
            CliError::Io(_) => "io_error",
            CliError::Cancelled(_) => "cancelled",
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Requirement(results) => {
                write!(f, "Requirements not met:")?;
                for r in results.iter().filter(|r| !r.passed) {
                    write!(f, " {} needs {} (have {});", r.component, r.need, r.have_display())?;
                }
                Ok(())
            }
            CliError::Parse(msg) => write!(f, "{}", msg),
            CliError::Runtime(msg) => write!(f, "{}", msg),
            CliError::Io(msg) => write!(f, "I/O error: {}", msg),
            CliError::Cancelled(Some(reason)) => write!(f, "Wizard cancelled: {}", reason),
            CliError::Cancelled(None) => write!(f, "Wizard cancelled"),
        }
    }
}

impl From<WizardError> for CliError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::Parse(e) => CliError::Parse(e.to_string()),
            WizardError::Runtime(e) => CliError::Runtime(e.to_string()),
            WizardError::RequirementNotMet { results } => CliError::Requirement(results),
            WizardError::Contract(e) => CliError::Runtime(e.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}
