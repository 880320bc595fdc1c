//! Notification hooks fired by the synchronizer and the commit coordinator

use tracing::info;

use crate::units::TranslationId;

pub trait Notifier: Send + Sync {
    /// Sync found new untranslated or newly fuzzy strings
    fn new_string(&self, translation: &TranslationId);

    fn pre_commit(&self, translation: &TranslationId);

    fn post_commit(&self, translation: &TranslationId);
}

/// Writes every notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn new_string(&self, translation: &TranslationId) {
        info!("{}: new strings to translate", translation);
    }

    fn pre_commit(&self, translation: &TranslationId) {
        info!("{}: pre commit", translation);
    }

    fn post_commit(&self, translation: &TranslationId) {
        info!("{}: post commit", translation);
    }
}
