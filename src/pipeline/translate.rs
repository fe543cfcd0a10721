use std::time::Duration;

use crate::error::PicTransError;
use crate::languages::Language;
use crate::providers::Translator;

use super::stage::{Stage, guarded};

/// Translate `texts` in one batch. Multi-line texts go out as separate lines
/// and are joined back with `\n` using each text's own line count.
pub async fn translate_batch(
    translator: &dyn Translator,
    from: Language,
    to: Language,
    texts: &[String],
    timeout: Duration,
) -> Result<Vec<String>, PicTransError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let (lines, counts) = flatten(texts);
    let expected = lines.len();
    let translated =
        guarded(Stage::Translating, timeout, translator.translate(from, to, lines)).await?;
    if translated.len() != expected {
        return Err(PicTransError::TranslationMismatch {
            expected,
            got: translated.len(),
        });
    }
    Ok(reassemble(translated, &counts))
}

fn flatten(texts: &[String]) -> (Vec<String>, Vec<usize>) {
    let mut lines = Vec::new();
    let mut counts = Vec::with_capacity(texts.len());
    for text in texts {
        let before = lines.len();
        lines.extend(text.split('\n').map(|line| line.trim_end_matches('\r').to_string()));
        counts.push(lines.len() - before);
    }
    (lines, counts)
}

fn reassemble(lines: Vec<String>, counts: &[usize]) -> Vec<String> {
    let mut lines = lines.into_iter();
    counts
        .iter()
        .map(|&count| lines.by_ref().take(count).collect::<Vec<_>>().join("\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CollaboratorFuture;
    use std::sync::Mutex;

    struct Recording {
        calls: Mutex<Vec<Vec<String>>>,
        drop_last: bool,
    }

    impl Translator for Recording {
        fn translate(
            &self,
            _from: Language,
            _to: Language,
            texts: Vec<String>,
        ) -> CollaboratorFuture<Vec<String>> {
            self.calls.lock().unwrap().push(texts.clone());
            let mut out: Vec<String> = texts.iter().map(|t| t.to_uppercase()).collect();
            if self.drop_last {
                out.pop();
            }
            Box::pin(async move { Ok(out) })
        }
    }

    fn recording(drop_last: bool) -> Recording {
        Recording {
            calls: Mutex::new(Vec::new()),
            drop_last,
        }
    }

    #[tokio::test]
    async fn multi_line_texts_are_flattened_then_rejoined() {
        let translator = recording(false);
        let texts = vec!["buy one\nget one".to_string(), "sale".to_string()];
        let out = translate_batch(
            &translator,
            Language::English,
            Language::French,
            &texts,
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(out, vec!["BUY ONE\nGET ONE", "SALE"]);
        let calls = translator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec!["buy one", "get one", "sale"]);
    }

    #[tokio::test]
    async fn short_answers_are_a_mismatch() {
        let translator = recording(true);
        let texts = vec!["a\nb".to_string()];
        let err = translate_batch(
            &translator,
            Language::English,
            Language::French,
            &texts,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PicTransError::TranslationMismatch { expected: 2, got: 1 }));
    }

    #[tokio::test]
    async fn nothing_to_translate_skips_the_call() {
        let translator = recording(false);
        let out = translate_batch(
            &translator,
            Language::English,
            Language::French,
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(out.is_empty());
        assert!(translator.calls.lock().unwrap().is_empty());
    }
}
