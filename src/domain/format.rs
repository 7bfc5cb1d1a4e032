//! The output-format allow-list and everything derived from it.
//!
//! A caller-supplied format string never reaches a filename or a command
//! flag directly; it has to parse into a [`DiagramFormat`] first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output formats the gateway accepts and passes to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    Svg,
    Png,
    Txt,
    Utxt,
    Eps,
    Pdf,
}

impl DiagramFormat {
    pub const ALL: [DiagramFormat; 6] = [
        DiagramFormat::Svg,
        DiagramFormat::Png,
        DiagramFormat::Txt,
        DiagramFormat::Utxt,
        DiagramFormat::Eps,
        DiagramFormat::Pdf,
    ];

    /// File extension used for the artifact, also the value of the
    /// renderer's `-t<format>` flag.
    pub fn extension(self) -> &'static str {
        match self {
            DiagramFormat::Svg => "svg",
            DiagramFormat::Png => "png",
            DiagramFormat::Txt => "txt",
            DiagramFormat::Utxt => "utxt",
            DiagramFormat::Eps => "eps",
            DiagramFormat::Pdf => "pdf",
        }
    }

    /// Whether the rendered artifact is textual (served and embedded as
    /// UTF-8) rather than binary (streamed, or base64-encoded inline).
    pub fn is_text(self) -> bool {
        matches!(
            self,
            DiagramFormat::Svg | DiagramFormat::Txt | DiagramFormat::Utxt
        )
    }

    /// Content type for serving an artifact of this format.
    pub fn content_type(self) -> String {
        match self {
            // `utxt` is PlantUML-specific and unknown to the mime registry.
            DiagramFormat::Txt | DiagramFormat::Utxt => {
                "text/plain; charset=utf-8".to_string()
            }
            DiagramFormat::Eps => "application/postscript".to_string(),
            other => mime_guess::from_ext(other.extension())
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

impl fmt::Display for DiagramFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error returned when a format string is outside the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedFormat(pub String);

impl fmt::Display for UnsupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported format `{}`", self.0)
    }
}

impl std::error::Error for UnsupportedFormat {}

impl FromStr for DiagramFormat {
    type Err = UnsupportedFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.extension().eq_ignore_ascii_case(value))
            .ok_or_else(|| UnsupportedFormat(value.to_string()))
    }
}
