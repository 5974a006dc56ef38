use fake::Fake;
use rand::{Rng, RngCore};

use crate::locales::LocaleKey;

/// Kind of realistic value a field name asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticKind {
    FullName,
    FirstName,
    LastName,
    Email,
    Username,
    Phone,
    Company,
    City,
    StreetAddress,
    Country,
    PostalCode,
    Url,
    JobTitle,
    Word,
    Sentence,
    Paragraph,
    Slug,
    Color,
}

/// Source of locale-aware realistic strings.
///
/// Implementations must draw all randomness from `rng` so output stays
/// reproducible under a fixed seed. `None` means the kind is not supported
/// and the caller falls back to plain words.
pub trait ValueProvider: Send + Sync {
    fn provide(
        &self,
        kind: SemanticKind,
        locale: LocaleKey,
        rng: &mut dyn RngCore,
    ) -> Option<String>;
}

const COLORS: &[&str] = &[
    "red", "orange", "yellow", "green", "teal", "blue", "indigo", "violet", "black",
    "white", "gray", "brown",
];

/// Provider backed by the `fake` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeValueProvider;

macro_rules! localized {
    ($locale:expr, $rng:expr, $module:ident :: $faker:ident ( $($arg:expr),* )) => {{
        let value: String = match $locale {
            LocaleKey::EnUs => fake::faker::$module::en::$faker($($arg),*).fake_with_rng($rng),
            LocaleKey::PtBr => fake::faker::$module::pt_br::$faker($($arg),*).fake_with_rng($rng),
        };
        value
    }};
}

impl ValueProvider for FakeValueProvider {
    fn provide(
        &self,
        kind: SemanticKind,
        locale: LocaleKey,
        rng: &mut dyn RngCore,
    ) -> Option<String> {
        let value = match kind {
            SemanticKind::FullName => localized!(locale, rng, name::Name()),
            SemanticKind::FirstName => localized!(locale, rng, name::FirstName()),
            SemanticKind::LastName => localized!(locale, rng, name::LastName()),
            SemanticKind::Email => localized!(locale, rng, internet::SafeEmail()),
            SemanticKind::Username => localized!(locale, rng, internet::Username()),
            SemanticKind::Phone => localized!(locale, rng, phone_number::PhoneNumber()),
            SemanticKind::Company => localized!(locale, rng, company::CompanyName()),
            SemanticKind::City => localized!(locale, rng, address::CityName()),
            SemanticKind::StreetAddress => {
                let number = rng.random_range(1..=9999);
                let street = localized!(locale, rng, address::StreetName());
                format!("{number} {street}")
            }
            SemanticKind::Country => localized!(locale, rng, address::CountryName()),
            SemanticKind::PostalCode => localized!(locale, rng, address::ZipCode()),
            SemanticKind::Url => {
                let host = localized!(locale, rng, lorem::Word()).to_lowercase();
                let suffix = localized!(locale, rng, internet::DomainSuffix());
                format!("https://www.{host}.{suffix}")
            }
            SemanticKind::JobTitle => localized!(locale, rng, job::Title()),
            SemanticKind::Word => localized!(locale, rng, lorem::Word()),
            SemanticKind::Sentence => {
                let words: Vec<String> = localized_words(locale, rng, 2..5);
                capitalize(&words.join(" "))
            }
            SemanticKind::Paragraph => localized!(locale, rng, lorem::Paragraph(1..3)),
            SemanticKind::Slug => {
                let words: Vec<String> = localized_words(locale, rng, 2..4);
                words.join("-").to_lowercase()
            }
            SemanticKind::Color => COLORS[rng.random_range(0..COLORS.len())].to_string(),
        };
        Some(value)
    }
}

fn localized_words(
    locale: LocaleKey,
    rng: &mut dyn RngCore,
    range: std::ops::Range<usize>,
) -> Vec<String> {
    match locale {
        LocaleKey::EnUs => fake::faker::lorem::en::Words(range).fake_with_rng(rng),
        LocaleKey::PtBr => fake::faker::lorem::pt_br::Words(range).fake_with_rng(rng),
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
