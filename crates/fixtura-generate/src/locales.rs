use std::fmt;

use tracing::warn;

/// Locales the value provider has data for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LocaleKey {
    #[default]
    EnUs,
    PtBr,
}

impl LocaleKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().replace('-', "_").as_str() {
            "en_US" | "en_us" | "en" => Some(Self::EnUs),
            "pt_BR" | "pt_br" | "pt" => Some(Self::PtBr),
            _ => None,
        }
    }

    /// Parse, falling back to `en_US` for locales without data.
    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| {
            warn!(locale = value, fallback = "en_US", "unsupported locale, using fallback");
            Self::default()
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnUs => "en_US",
            Self::PtBr => "pt_BR",
        }
    }
}

impl fmt::Display for LocaleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
