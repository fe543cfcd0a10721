use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::PicTransError;
use crate::languages::Language;
use crate::layout::font::{FontBook, FontId};
use crate::policy::ReplacementPolicy;
use crate::providers::{
    BaiduTranslator, Detector, DetectorKind, HttpDetector, HttpInpainter, IdentityTranslator,
    Inpainter, LocalStore, ObjectStore, OpenAiTranslator, TesseractDetector, Translator,
    TranslatorKind,
};
use crate::settings::Settings;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>> + Send + Sync>;

/// A collaborator built on first use and shared afterwards.
struct Lazy<T: ?Sized> {
    name: &'static str,
    cell: OnceCell<Arc<T>>,
    factory: Factory<T>,
}

impl<T: ?Sized> Lazy<T> {
    fn new(name: &'static str, factory: Factory<T>) -> Self {
        Self {
            name,
            cell: OnceCell::new(),
            factory,
        }
    }

    async fn get(&self) -> Result<Arc<T>> {
        let value = self
            .cell
            .get_or_try_init(|| async {
                debug!("initializing {}", self.name);
                (self.factory)()
            })
            .await?;
        Ok(Arc::clone(value))
    }
}

const SOURCE_LANGUAGES: [Language; 2] = [Language::Chinese, Language::English];

const TARGETS_FROM_CHINESE: [Language; 8] = [
    Language::Japanese,
    Language::English,
    Language::ChineseTraditional,
    Language::German,
    Language::French,
    Language::Korean,
    Language::Thai,
    Language::Vietnamese,
];

const TARGETS_FROM_ENGLISH: [Language; 8] = [
    Language::Japanese,
    Language::Chinese,
    Language::ChineseTraditional,
    Language::German,
    Language::French,
    Language::Korean,
    Language::Thai,
    Language::Vietnamese,
];

/// Everything a task needs that outlives the task: replacement policies per
/// language pair, loaded fonts, and the external collaborators.
pub struct Registry {
    policies: HashMap<(Language, Language), ReplacementPolicy>,
    fonts: FontBook,
    detector: Lazy<dyn Detector>,
    translator: Lazy<dyn Translator>,
    inpainter: Lazy<dyn Inpainter>,
    store: Lazy<dyn ObjectStore>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Production wiring: the stock language pairs and the collaborators the
    /// settings name.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base = ReplacementPolicy::new(FontId::new(settings.default_font.as_str()))
            .with_erase(settings.erase_mode)
            .with_color(settings.text_color);

        let mut builder = Registry::builder().fonts(FontBook::load(&settings.fonts));
        for from in SOURCE_LANGUAGES {
            let targets: &[Language] = match from {
                Language::Chinese => &TARGETS_FROM_CHINESE,
                _ => &TARGETS_FROM_ENGLISH,
            };
            for &to in targets {
                builder = builder.policy(from, to, base.clone());
            }
        }
        // targets that keep horizontal glyphs turn vertical lines instead of stacking them
        builder = builder
            .policy(Language::English, Language::Chinese, base.clone().quarter_turn())
            .policy(Language::English, Language::German, base.clone().quarter_turn());

        let detector_kind = settings.detector;
        let detector_endpoint = settings.detector_endpoint.clone();
        builder = builder.detector(move || -> Result<Arc<dyn Detector>> {
            match detector_kind {
                DetectorKind::Tesseract => Ok(Arc::new(TesseractDetector::new())),
                DetectorKind::Http => {
                    let endpoint = detector_endpoint.clone().ok_or_else(|| {
                        anyhow!("[detector] endpoint is required for kind = \"http\"")
                    })?;
                    Ok(Arc::new(HttpDetector::new(endpoint)))
                }
            }
        });

        let translator_kind = settings.translator;
        let translator_model = settings.translator_model.clone();
        builder = builder.translator(move || -> Result<Arc<dyn Translator>> {
            match translator_kind {
                TranslatorKind::Baidu => Ok(Arc::new(BaiduTranslator::from_env()?)),
                TranslatorKind::OpenAi => Ok(Arc::new(OpenAiTranslator::from_env(
                    translator_model.clone(),
                )?)),
                TranslatorKind::Identity => Ok(Arc::new(IdentityTranslator)),
            }
        });

        let inpaint_endpoint = settings.inpaint_endpoint.clone();
        builder = builder.inpainter(move || -> Result<Arc<dyn Inpainter>> {
            let endpoint = inpaint_endpoint
                .clone()
                .ok_or_else(|| anyhow!("[inpaint] endpoint is not configured"))?;
            Ok(Arc::new(HttpInpainter::new(endpoint)))
        });

        let store_dir = settings.store_dir.clone();
        let store_url = settings.store_url.clone();
        builder = builder.store(move || -> Result<Arc<dyn ObjectStore>> {
            Ok(Arc::new(LocalStore::new(store_dir.clone(), store_url.clone())))
        });

        builder.build()
    }

    pub fn policy(
        &self,
        from: Language,
        to: Language,
    ) -> Result<&ReplacementPolicy, PicTransError> {
        self.policies
            .get(&(from, to))
            .ok_or(PicTransError::UnsupportedLanguagePair { from, to })
    }

    pub fn language_pairs(&self) -> Vec<(Language, Language)> {
        let mut pairs: Vec<_> = self.policies.keys().copied().collect();
        pairs.sort();
        pairs
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    pub async fn detector(&self) -> Result<Arc<dyn Detector>> {
        self.detector.get().await
    }

    pub async fn translator(&self) -> Result<Arc<dyn Translator>> {
        self.translator.get().await
    }

    pub async fn inpainter(&self) -> Result<Arc<dyn Inpainter>> {
        self.inpainter.get().await
    }

    pub async fn store(&self) -> Result<Arc<dyn ObjectStore>> {
        self.store.get().await
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    policies: HashMap<(Language, Language), ReplacementPolicy>,
    fonts: FontBook,
    detector: Option<Factory<dyn Detector>>,
    translator: Option<Factory<dyn Translator>>,
    inpainter: Option<Factory<dyn Inpainter>>,
    store: Option<Factory<dyn ObjectStore>>,
}

impl RegistryBuilder {
    pub fn policy(mut self, from: Language, to: Language, policy: ReplacementPolicy) -> Self {
        self.policies.insert((from, to), policy);
        self
    }

    pub fn fonts(mut self, fonts: FontBook) -> Self {
        self.fonts = fonts;
        self
    }

    pub fn detector(
        mut self,
        factory: impl Fn() -> Result<Arc<dyn Detector>> + Send + Sync + 'static,
    ) -> Self {
        self.detector = Some(Box::new(factory));
        self
    }

    pub fn translator(
        mut self,
        factory: impl Fn() -> Result<Arc<dyn Translator>> + Send + Sync + 'static,
    ) -> Self {
        self.translator = Some(Box::new(factory));
        self
    }

    pub fn inpainter(
        mut self,
        factory: impl Fn() -> Result<Arc<dyn Inpainter>> + Send + Sync + 'static,
    ) -> Self {
        self.inpainter = Some(Box::new(factory));
        self
    }

    pub fn store(
        mut self,
        factory: impl Fn() -> Result<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    ) -> Self {
        self.store = Some(Box::new(factory));
        self
    }

    /// Register ready-made collaborators, mostly for tests and embedding.
    pub fn with_instances(
        self,
        detector: Arc<dyn Detector>,
        translator: Arc<dyn Translator>,
        inpainter: Arc<dyn Inpainter>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        self.detector(move || Ok(Arc::clone(&detector)))
            .translator(move || Ok(Arc::clone(&translator)))
            .inpainter(move || Ok(Arc::clone(&inpainter)))
            .store(move || Ok(Arc::clone(&store)))
    }

    pub fn build(self) -> Result<Registry> {
        Ok(Registry {
            policies: self.policies,
            fonts: self.fonts,
            detector: Lazy::new(
                "detector",
                self.detector.ok_or_else(|| anyhow!("no detector registered"))?,
            ),
            translator: Lazy::new(
                "translator",
                self.translator.ok_or_else(|| anyhow!("no translator registered"))?,
            ),
            inpainter: Lazy::new(
                "inpainter",
                self.inpainter.ok_or_else(|| anyhow!("no inpainter registered"))?,
            ),
            store: Lazy::new(
                "object store",
                self.store.ok_or_else(|| anyhow!("no object store registered"))?,
            ),
        })
    }
}
