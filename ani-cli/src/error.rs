//! Error handling for the ANI CLI

use std::path::PathBuf;
use thiserror::Error;

/// User-facing errors with a known remedy
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database { message: message.into() }
    }

    pub fn external_tool<S: Into<String>, M: Into<String>>(tool: S, message: M) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn scheduler<S: Into<String>>(message: S) -> Self {
        Self::Scheduler { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the path is correct: {}\n\
                 • Ensure you have read permissions for it\n\
                 • Genome files must end in .fna, .fa, .fasta or .fas",
                path.display()
            ));
        }

        CliError::ExternalTool { tool, .. } => {
            match tool.as_str() {
                "nucmer" | "delta-filter" => {
                    message.push_str(
                        "\n\nSuggestions:\n\
                         • Install MUMmer: https://github.com/mummer4/mummer\n\
                         • Ensure nucmer and delta-filter are in your PATH\n\
                         • Or set [anim] nucmer_exe / filter_exe in ani.toml"
                    );
                }
                _ => {
                    message.push_str(&format!(
                        "\n\nSuggestions:\n\
                         • Install {}\n\
                         • Ensure {} is in your PATH",
                        tool, tool
                    ));
                }
            }
        }

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your ani.toml configuration file\n\
                 • Use 'ani config --example' to generate a sample configuration"
            );
        }

        CliError::Database { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Create the store first with 'ani createdb'\n\
                 • Check the --dbpath argument or [database] path in ani.toml\n\
                 • Ensure you have write permissions for the database file"
            );
        }

        CliError::Scheduler { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check the job logs in the output directory\n\
                 • Rerun with --recovery to reuse output that was already written"
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("genomes"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the path is correct"));
    }

    #[test]
    fn test_tool_suggestions() {
        let err = CliError::external_tool("nucmer", "not found");
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.starts_with("External tool error: nucmer - not found"));
        assert!(formatted.contains("Install MUMmer"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err: CliError = io_err.into();
        assert!(matches!(cli_err, CliError::Io { .. }));
    }
}
