use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Sheet '{0}' not found in workbook")]
    SheetNotFound(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("No column matching '{fragment}' in {source_name}")]
    MissingColumn {
        fragment: String,
        source_name: String,
    },

    #[error("Invalid date '{value}': {details}")]
    InvalidDate { value: String, details: String },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error("Text generation failed after {attempts} attempt(s): {message}")]
    Generation { attempts: u32, message: String },

    #[error("Chart assembly error: {0}")]
    Chart(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<calamine::Error> for InsightsError {
    fn from(err: calamine::Error) -> Self {
        Self::Workbook(err.to_string())
    }
}

impl From<zip::result::ZipError> for InsightsError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Docx(err.to_string())
    }
}

impl From<quick_xml::Error> for InsightsError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Docx(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
