//! Error type shared by the parser, the coordinate pipeline and the filter compiler.

use thiserror::Error;

/// Errors surfaced by region parsing, conversion and filtering.
///
/// Syntax errors are only fatal when a single line is parsed directly with
/// [`crate::grammar::parse_line`]; the stream parser logs them and moves on.
#[derive(Debug, Error)]
pub enum RegionError {
    #[error("failed to parse region line '{line}':\n{message}")]
    Syntax { line: String, message: String },

    #[error("cannot determine a sky frame from CTYPE1='{ctype1}', CTYPE2='{ctype2}', EQUINOX={equinox:?}")]
    UnresolvableFrame {
        ctype1: String,
        ctype2: String,
        equinox: Option<f64>,
    },

    #[error("physical coordinates requested but CRVALnP/CRPIXnP/CDELTnP keywords are missing")]
    PhysicalCoordinateMissing,

    #[error("pixel scale is undefined at the pole (latitude {latitude})")]
    PoleSingularity { latitude: f64 },

    #[error("ambiguous number of comments {comments} for number of shapes {shapes}")]
    CommentCountMismatch { comments: usize, shapes: usize },

    #[error("{shape} has {count} coordinates, which does not fit its argument layout")]
    ArgumentCount { shape: String, count: usize },

    #[error("the region has non-image coordinates; a WCS is required")]
    HeaderRequired,

    #[error("coordinate frame '{0}' cannot be converted to image coordinates")]
    UnsupportedFrame(String),

    #[error("unsupported projection '{0}'")]
    UnsupportedProjection(String),

    #[error("missing header keyword {0}")]
    MissingKeyword(String),

    #[error("projection failed: {0}")]
    Projection(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read region text: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RegionError>;

impl From<::wcs::error::Error> for RegionError {
    fn from(err: ::wcs::error::Error) -> Self {
        match err {
            ::wcs::error::Error::NotImplementedProjection(code) => RegionError::UnsupportedProjection(code),
            ::wcs::error::Error::MandatoryWCSKeywordsMissing(key) => RegionError::MissingKeyword(key.to_string()),
            other => RegionError::Projection(other.to_string()),
        }
    }
}
