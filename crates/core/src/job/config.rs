//! Per-request job configuration.

use serde::{Deserialize, Serialize};

use super::error::JobConfigError;
use super::languages::find_language;
use super::pages::{resolve_pages, PageRange};
use super::services::{Provider, ServiceCatalog, DEFAULT_SERVICE};
use crate::engine::{DualLayout, DualPageOrder};

pub const MIN_QPS: u32 = 1;
pub const MAX_QPS: u32 = 20;
pub const MIN_SPLIT_FACTOR: f64 = 0.1;
pub const MAX_SPLIT_FACTOR: f64 = 1.0;

/// Watermarking of produced PDFs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkMode {
    #[default]
    #[serde(alias = "Watermarked")]
    Watermarked,
    #[serde(alias = "No Watermark")]
    NoWatermark,
}

/// Every option a translation request may set.
///
/// Unset fields take their defaults, so `{}` is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    /// Service (model) name from the catalog.
    pub service: String,
    /// Source language, display name or code.
    pub lang_from: String,
    /// Target language, display name or code.
    pub lang_to: String,

    pub page_range: PageRange,
    /// Page list for `page_range = "range"`, e.g. `1,3-5`.
    pub page_input: Option<String>,

    pub no_mono: bool,
    pub no_dual: bool,
    /// Put the translated page on the left of side-by-side dual pages.
    pub dual_translate_first: bool,
    /// Interleave original and translated pages instead of side-by-side.
    pub use_alternating_pages_dual: bool,
    pub watermark_output_mode: WatermarkMode,

    #[serde(alias = "custom_system_prompt_input")]
    pub custom_system_prompt: Option<String>,
    /// Requests per second to the translation service.
    pub threads: u32,
    pub min_text_length: u32,
    pub rpc_doclayout: Option<String>,
    pub pool_max_workers: Option<u32>,
    pub no_auto_extract_glossary: bool,
    /// `"Auto"` lets the engine choose.
    pub primary_font_family: Option<String>,

    pub skip_clean: bool,
    pub disable_rich_text_translate: bool,
    pub enhance_compatibility: bool,
    pub split_short_lines: bool,
    pub short_line_split_factor: f64,
    pub translate_table_text: bool,
    pub skip_scanned_detection: bool,
    pub ocr_workaround: bool,
    pub auto_enable_ocr_workaround: bool,
    /// 0 translates the document in one part.
    pub max_pages_per_part: u32,
    pub formular_font_pattern: Option<String>,
    pub formular_char_pattern: Option<String>,
    pub ignore_cache: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            lang_from: "English".to_string(),
            lang_to: "Simplified Chinese".to_string(),
            page_range: PageRange::All,
            page_input: None,
            no_mono: false,
            no_dual: false,
            dual_translate_first: false,
            use_alternating_pages_dual: false,
            watermark_output_mode: WatermarkMode::Watermarked,
            custom_system_prompt: None,
            threads: 4,
            min_text_length: 10,
            rpc_doclayout: None,
            pool_max_workers: None,
            no_auto_extract_glossary: false,
            primary_font_family: None,
            skip_clean: false,
            disable_rich_text_translate: false,
            enhance_compatibility: false,
            split_short_lines: false,
            short_line_split_factor: 0.5,
            translate_table_text: false,
            skip_scanned_detection: false,
            ocr_workaround: false,
            auto_enable_ocr_workaround: false,
            max_pages_per_part: 0,
            formular_font_pattern: None,
            formular_char_pattern: None,
            ignore_cache: false,
        }
    }
}

/// Service selection handed to the engine. The key never leaves the process
/// except through the engine's environment.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedService {
    pub model: String,
    pub provider: Provider,
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutputSettings {
    pub no_mono: bool,
    pub no_dual: bool,
    pub dual: DualLayout,
    pub watermark: WatermarkMode,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TranslationSettings {
    pub qps: u32,
    pub min_text_length: u32,
    pub rpc_doclayout: Option<String>,
    pub pool_max_workers: Option<u32>,
    pub no_auto_extract_glossary: bool,
    pub primary_font_family: Option<String>,
    pub custom_system_prompt: Option<String>,
    pub ignore_cache: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PdfSettings {
    pub skip_clean: bool,
    pub disable_rich_text_translate: bool,
    pub enhance_compatibility: bool,
    pub split_short_lines: bool,
    pub short_line_split_factor: f64,
    pub translate_table_text: bool,
    pub skip_scanned_detection: bool,
    pub ocr_workaround: bool,
    pub auto_enable_ocr_workaround: bool,
    pub max_pages_per_part: Option<u32>,
    pub formular_font_pattern: Option<String>,
    pub formular_char_pattern: Option<String>,
}

/// Validated settings in the shape the engine consumes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobSettings {
    pub service: ResolvedService,
    /// Source language code.
    pub lang_in: String,
    /// Target language code.
    pub lang_out: String,
    /// Engine page list; `None` translates every page.
    pub pages: Option<String>,
    pub output: OutputSettings,
    pub translation: TranslationSettings,
    pub pdf: PdfSettings,
}

impl JobConfig {
    /// Check every field and produce the engine settings.
    pub fn resolve(&self, catalog: &ServiceCatalog) -> Result<JobSettings, JobConfigError> {
        let service = catalog
            .get(&self.service)
            .ok_or_else(|| JobConfigError::UnknownService(self.service.clone()))?;
        let lang_in = find_language(&self.lang_from)
            .ok_or_else(|| JobConfigError::UnknownLanguage(self.lang_from.clone()))?;
        let lang_out = find_language(&self.lang_to)
            .ok_or_else(|| JobConfigError::UnknownLanguage(self.lang_to.clone()))?;

        if !(MIN_QPS..=MAX_QPS).contains(&self.threads) {
            return Err(JobConfigError::OutOfRange {
                field: "threads",
                min: MIN_QPS as f64,
                max: MAX_QPS as f64,
                value: self.threads as f64,
            });
        }
        if !(MIN_SPLIT_FACTOR..=MAX_SPLIT_FACTOR).contains(&self.short_line_split_factor) {
            return Err(JobConfigError::OutOfRange {
                field: "short_line_split_factor",
                min: MIN_SPLIT_FACTOR,
                max: MAX_SPLIT_FACTOR,
                value: self.short_line_split_factor,
            });
        }
        if self.no_mono && self.no_dual {
            return Err(JobConfigError::NoOutputs);
        }

        let pages = resolve_pages(self.page_range, self.page_input.as_deref())?;

        let order = if self.dual_translate_first {
            DualPageOrder::TranslatedFirst
        } else {
            DualPageOrder::OriginalFirst
        };

        Ok(JobSettings {
            service: ResolvedService {
                model: service.descriptor.name.to_string(),
                provider: service.descriptor.provider,
                base_url: service.base_url.clone(),
                api_key: service.api_key().map(str::to_string),
            },
            lang_in: lang_in.code.to_string(),
            lang_out: lang_out.code.to_string(),
            pages,
            output: OutputSettings {
                no_mono: self.no_mono,
                no_dual: self.no_dual,
                dual: DualLayout {
                    order,
                    alternating_pages: self.use_alternating_pages_dual,
                },
                watermark: self.watermark_output_mode,
            },
            translation: TranslationSettings {
                qps: self.threads,
                min_text_length: self.min_text_length,
                rpc_doclayout: non_empty(&self.rpc_doclayout),
                pool_max_workers: self.pool_max_workers.filter(|n| *n > 0),
                no_auto_extract_glossary: self.no_auto_extract_glossary,
                primary_font_family: non_empty(&self.primary_font_family)
                    .filter(|f| !f.eq_ignore_ascii_case("auto")),
                custom_system_prompt: non_empty(&self.custom_system_prompt),
                ignore_cache: self.ignore_cache,
            },
            pdf: PdfSettings {
                skip_clean: self.skip_clean,
                disable_rich_text_translate: self.disable_rich_text_translate,
                enhance_compatibility: self.enhance_compatibility,
                split_short_lines: self.split_short_lines,
                short_line_split_factor: self.short_line_split_factor,
                translate_table_text: self.translate_table_text,
                skip_scanned_detection: self.skip_scanned_detection,
                ocr_workaround: self.ocr_workaround,
                auto_enable_ocr_workaround: self.auto_enable_ocr_workaround,
                max_pages_per_part: Some(self.max_pages_per_part).filter(|n| *n > 0),
                formular_font_pattern: non_empty(&self.formular_font_pattern),
                formular_char_pattern: non_empty(&self.formular_char_pattern),
            },
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
