//! Supported document languages.

use serde::Serialize;

/// A language the engine can translate from or to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Language {
    pub display_name: &'static str,
    pub code: &'static str,
}

/// Display name to engine code, in presentation order.
pub const LANGUAGES: &[Language] = &[
    Language { display_name: "English", code: "en" },
    Language { display_name: "Simplified Chinese", code: "zh" },
    Language { display_name: "Traditional Chinese", code: "zh-TW" },
    Language { display_name: "Japanese", code: "ja" },
    Language { display_name: "Korean", code: "ko" },
    Language { display_name: "French", code: "fr" },
    Language { display_name: "German", code: "de" },
    Language { display_name: "Spanish", code: "es" },
    Language { display_name: "Italian", code: "it" },
    Language { display_name: "Portuguese", code: "pt" },
    Language { display_name: "Russian", code: "ru" },
    Language { display_name: "Arabic", code: "ar" },
    Language { display_name: "Dutch", code: "nl" },
    Language { display_name: "Polish", code: "pl" },
    Language { display_name: "Turkish", code: "tr" },
    Language { display_name: "Ukrainian", code: "uk" },
    Language { display_name: "Vietnamese", code: "vi" },
    Language { display_name: "Thai", code: "th" },
    Language { display_name: "Indonesian", code: "id" },
    Language { display_name: "Hindi", code: "hi" },
];

/// Look up a language by display name (case-insensitive) or by code.
pub fn find_language(name_or_code: &str) -> Option<&'static Language> {
    let needle = name_or_code.trim();
    LANGUAGES.iter().find(|lang| {
        lang.display_name.eq_ignore_ascii_case(needle) || lang.code.eq_ignore_ascii_case(needle)
    })
}
