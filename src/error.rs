use derive_more::{Display, From};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    #[display("JSON error: {_0}")]
    #[from]
    Json(serde_json::Error),

    #[display("OpenAI error: {_0}")]
    #[from]
    OpenAI(async_openai::error::OpenAIError),

    #[display("{_0}")]
    Custom(String),
}

impl Error {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::OpenAI(e) => Some(e),
            Self::Custom(_) => None,
        }
    }
}
