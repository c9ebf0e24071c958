use thiserror::Error;

#[derive(Error, Debug)]
pub enum As3Error {
    #[error("Validation error in '{field}': {message}")]
    ValidationError { field: String, message: String },

    #[error("Template error at '{placeholder}': {message}")]
    TemplateError { placeholder: String, message: String },

    #[error("Deploy failed: {message}")]
    DeployError { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Template,
    Deploy,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// The device rejected or never confirmed the declaration.
    Medium,
    /// Input problem; nothing was sent.
    High,
    /// Local environment problem.
    Critical,
}

impl As3Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn template(placeholder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateError {
            placeholder: placeholder.into(),
            message: message.into(),
        }
    }

    pub fn deploy(message: impl Into<String>) -> Self {
        Self::DeployError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError { .. } => ErrorCategory::Validation,
            Self::TemplateError { .. } => ErrorCategory::Template,
            Self::DeployError { .. } | Self::ApiError(_) => ErrorCategory::Deploy,
            Self::ConfigError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Deploy => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Validation | ErrorCategory::Template => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => {
                "Fix the reported application field in the configuration file and run again"
            }
            Self::TemplateError { .. } => {
                "Check that every {{placeholder}} in the template names a known application field"
            }
            Self::DeployError { .. } => {
                "Inspect the device response above; the declaration was not applied"
            }
            Self::ApiError(_) => {
                "Check that the BIG-IP management address is reachable and the credentials are valid"
            }
            Self::ConfigError { .. } => {
                "Make sure the configuration file exists and is valid TOML"
            }
            Self::IoError(_) => "Check file paths and permissions",
            Self::SerializationError(_) => "Check that the template produces valid JSON",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ValidationError { field, message } => {
                format!("Invalid input for {}: {}", field, message)
            }
            Self::TemplateError { placeholder, message } => {
                format!("Could not render the declaration ({}): {}", placeholder, message)
            }
            Self::DeployError { message } => format!("The device rejected the declaration: {}", message),
            Self::ApiError(e) => format!("Could not reach the device: {}", e),
            Self::ConfigError { message } => format!("Could not load configuration: {}", message),
            Self::IoError(e) => format!("File operation failed: {}", e),
            Self::SerializationError(e) => format!("Invalid JSON: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, As3Error>;
