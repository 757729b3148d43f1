//! Display-font acquisition with graceful degradation.
//!
//! The compositor prefers a handwriting-style font fetched from a public
//! mirror; any failure along the way (network, status, malformed bytes)
//! falls back to a standard oblique font. Acquisition never fails outward.

use std::time::Duration;

use rusttype::{Font, Scale};
use tracing::{info, warn};

/// Standard-14 font used when no handwriting font could be acquired.
pub const STANDARD_FALLBACK: &str = "Helvetica-Oblique";

/// Public mirrors tried in sequence for the handwriting font.
pub const DEFAULT_FONT_MIRRORS: &[&str] = &[
    "https://github.com/google/fonts/raw/main/ofl/greatvibes/GreatVibes-Regular.ttf",
    "https://github.com/google/fonts/raw/main/apache/homemadeapple/HomemadeApple-Regular.ttf",
];

/// The font the compositor will draw text with.
pub enum DisplayFont {
    /// Fetched TrueType bytes, validated and measured.
    Embedded(EmbeddedFont),
    /// A standard-14 base font name; nothing to embed.
    Standard(&'static str),
}

impl DisplayFont {
    pub fn is_embedded(&self) -> bool {
        matches!(self, DisplayFont::Embedded(_))
    }
}

/// Validated TrueType data plus the advance widths needed for the PDF
/// `Widths` array (chars 32..=126, in 1/1000 text-space units).
pub struct EmbeddedFont {
    pub data: Vec<u8>,
    pub widths: Vec<i64>,
}

impl EmbeddedFont {
    /// Parse candidate bytes; `None` when they are not a usable font.
    pub fn from_bytes(data: Vec<u8>) -> Option<Self> {
        let font = Font::try_from_vec(data.clone())?;
        let scale = Scale::uniform(1000.0);
        let widths = (32u8..=126)
            .map(|c| {
                let advance = font
                    .glyph(char::from(c))
                    .scaled(scale)
                    .h_metrics()
                    .advance_width;
                advance.round() as i64
            })
            .collect();
        Some(Self { data, widths })
    }
}

/// Try each mirror in sequence; degrade to the standard oblique font when
/// all of them fail. Never returns an error.
pub async fn acquire_display_font(
    client: &reqwest::Client,
    mirrors: &[String],
    timeout: Duration,
) -> DisplayFont {
    for url in mirrors {
        match fetch_candidate(client, url, timeout).await {
            Ok(bytes) => match EmbeddedFont::from_bytes(bytes) {
                Some(font) => {
                    info!(url = %url, bytes = font.data.len(), "display font acquired");
                    return DisplayFont::Embedded(font);
                }
                None => warn!(url = %url, "fetched bytes are not a usable font"),
            },
            Err(reason) => warn!(url = %url, %reason, "font fetch failed"),
        }
    }
    info!(fallback = STANDARD_FALLBACK, "using standard display font");
    DisplayFont::Standard(STANDARD_FALLBACK)
}

async fn fetch_candidate(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("status {status}"));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_are_not_a_font() {
        assert!(EmbeddedFont::from_bytes(b"not a font".to_vec()).is_none());
        assert!(EmbeddedFont::from_bytes(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_no_mirrors_falls_back_to_standard() {
        let client = reqwest::Client::new();
        let font = acquire_display_font(&client, &[], Duration::from_millis(100)).await;
        assert!(!font.is_embedded());
        assert!(matches!(font, DisplayFont::Standard(name) if name == STANDARD_FALLBACK));
    }

    #[tokio::test]
    async fn test_unreachable_mirror_falls_back_to_standard() {
        let client = reqwest::Client::new();
        let mirrors = vec!["http://127.0.0.1:1/font.ttf".to_string()];
        let font = acquire_display_font(&client, &mirrors, Duration::from_millis(200)).await;
        assert!(!font.is_embedded());
    }
}
