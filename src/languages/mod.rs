use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::PicTransError;

/// Languages the pipeline knows how to detect and translate.
///
/// Each language carries three codes: the translation code (also the code
/// used on the wire and in scene metadata), the PaddleOCR model code used by
/// remote detectors, and the tesseract traineddata name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    English,
    Chinese,
    Japanese,
    ChineseTraditional,
    Korean,
    Vietnamese,
    German,
    French,
    Thai,
    Czech,
    Dutch,
    Hungarian,
    Italian,
    Polish,
    Portuguese,
    Romanian,
    Russian,
    Spanish,
    Serbian,
    Croatian,
}

const ALL: [Language; 20] = [
    Language::English,
    Language::Chinese,
    Language::Japanese,
    Language::ChineseTraditional,
    Language::Korean,
    Language::Vietnamese,
    Language::German,
    Language::French,
    Language::Thai,
    Language::Czech,
    Language::Dutch,
    Language::Hungarian,
    Language::Italian,
    Language::Polish,
    Language::Portuguese,
    Language::Romanian,
    Language::Russian,
    Language::Spanish,
    Language::Serbian,
    Language::Croatian,
];

impl Language {
    pub fn all() -> &'static [Language] {
        &ALL
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Japanese => "jp",
            Language::ChineseTraditional => "cht",
            Language::Korean => "kor",
            Language::Vietnamese => "vie",
            Language::German => "de",
            Language::French => "fra",
            Language::Thai => "th",
            Language::Czech => "cs",
            Language::Dutch => "nl",
            Language::Hungarian => "hu",
            Language::Italian => "it",
            Language::Polish => "pl",
            Language::Portuguese => "pt",
            Language::Romanian => "rom",
            Language::Russian => "ru",
            Language::Spanish => "spa",
            Language::Serbian => "srp",
            Language::Croatian => "hrv",
        }
    }

    pub fn ocr_code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Chinese => "ch",
            Language::Japanese => "japan",
            Language::ChineseTraditional => "chinese_cht",
            Language::Korean => "korean",
            Language::German => "german",
            Language::French => "fr",
            other => other.code(),
        }
    }

    pub fn tesseract_code(&self) -> &'static str {
        match self {
            Language::English => "eng",
            Language::Chinese => "chi_sim",
            Language::Japanese => "jpn",
            Language::ChineseTraditional => "chi_tra",
            Language::Korean => "kor",
            Language::Vietnamese => "vie",
            Language::German => "deu",
            Language::French => "fra",
            Language::Thai => "tha",
            Language::Czech => "ces",
            Language::Dutch => "nld",
            Language::Hungarian => "hun",
            Language::Italian => "ita",
            Language::Polish => "pol",
            Language::Portuguese => "por",
            Language::Romanian => "ron",
            Language::Russian => "rus",
            Language::Spanish => "spa",
            Language::Serbian => "srp",
            Language::Croatian => "hrv",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Chinese => "Simplified Chinese",
            Language::Japanese => "Japanese",
            Language::ChineseTraditional => "Traditional Chinese",
            Language::Korean => "Korean",
            Language::Vietnamese => "Vietnamese",
            Language::German => "German",
            Language::French => "French",
            Language::Thai => "Thai",
            Language::Czech => "Czech",
            Language::Dutch => "Dutch",
            Language::Hungarian => "Hungarian",
            Language::Italian => "Italian",
            Language::Polish => "Polish",
            Language::Portuguese => "Portuguese",
            Language::Romanian => "Romanian",
            Language::Russian => "Russian",
            Language::Spanish => "Spanish",
            Language::Serbian => "Serbian",
            Language::Croatian => "Croatian",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let code = normalize_code(code);
        if let Some(lang) = ALL.iter().find(|lang| lang.code() == code) {
            return Some(*lang);
        }
        match code.as_str() {
            "ja" | "jpn" => Some(Language::Japanese),
            "ko" => Some(Language::Korean),
            "zh-hans" | "chs" | "cn" => Some(Language::Chinese),
            "zh-hant" | "zh-tw" => Some(Language::ChineseTraditional),
            "vi" => Some(Language::Vietnamese),
            "fr" => Some(Language::French),
            "es" => Some(Language::Spanish),
            "ro" => Some(Language::Romanian),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = PicTransError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Language::from_code(value)
            .ok_or_else(|| PicTransError::UnsupportedLanguage(value.to_string()))
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_code() {
        for lang in Language::all() {
            assert_eq!(Language::from_code(lang.code()), Some(*lang));
        }
    }

    #[test]
    fn aliases_and_case_are_accepted() {
        assert_eq!(Language::from_code(" JA "), Some(Language::Japanese));
        assert_eq!(Language::from_code("zh-Hant"), Some(Language::ChineseTraditional));
        assert!(Language::from_code("tlh").is_none());
    }

    #[test]
    fn unknown_code_is_a_typed_error() {
        let err = "xx".parse::<Language>().unwrap_err();
        assert!(matches!(err, PicTransError::UnsupportedLanguage(code) if code == "xx"));
    }
}
