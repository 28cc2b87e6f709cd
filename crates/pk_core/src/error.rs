use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InvalidInput(String),
    InvalidData(String),
    Io(String),
    Network(String),
    Http { status: u16, message: String },
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network(message.into())
    }

    pub fn http<M: Into<String>>(status: u16, message: M) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::Network(_) => "network_error",
            Self::Http { .. } => "http_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) => message,
            Self::InvalidData(message) => message,
            Self::Io(message) => message,
            Self::Network(message) => message,
            Self::Http { message, .. } => message,
        }
    }

    /// HTTP status for backend rejections, `None` for everything else.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::invalid_data(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
