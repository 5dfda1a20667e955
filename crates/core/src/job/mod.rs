//! Translation job configuration: request options, languages and services.

mod config;
mod error;
mod languages;
mod pages;
mod services;

pub use config::{
    JobConfig, JobSettings, OutputSettings, PdfSettings, ResolvedService, TranslationSettings,
    WatermarkMode, MAX_QPS, MAX_SPLIT_FACTOR, MIN_QPS, MIN_SPLIT_FACTOR,
};
pub use error::JobConfigError;
pub use languages::{find_language, Language, LANGUAGES};
pub use pages::{parse_page_list, resolve_pages, PageRange};
pub use services::{
    Provider, ServiceCatalog, ServiceDescriptor, ServiceEntry, ServiceInfo, DEFAULT_SERVICE,
    SERVICES,
};
