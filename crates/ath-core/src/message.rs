//! Callout text: locale/OS lookup and `%icon` substitution.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::environment::Os;
use crate::options::Message;

static ICON_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)%icon(?:\[([^\]]+)\])?").unwrap());

/// Locale used when the visitor's locale has no preset.
pub const FALLBACK_LOCALE: &str = "en_us";

/// Locale → OS key → template. Consulted read-only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageTable(BTreeMap<String, BTreeMap<String, String>>);

impl MessageTable {
    pub fn new(entries: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        Self(entries)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Presets shipped with the library.
    pub fn builtin() -> Self {
        let mut table = BTreeMap::new();
        for (locale, ios, android, windows) in BUILTIN {
            let mut by_os = BTreeMap::new();
            by_os.insert(Os::Ios.as_str().to_string(), ios.to_string());
            by_os.insert(Os::Android.as_str().to_string(), android.to_string());
            by_os.insert(Os::Windows.as_str().to_string(), windows.to_string());
            table.insert(locale.to_string(), by_os);
        }
        Self(table)
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.0.contains_key(locale)
    }

    pub fn get(&self, locale: &str, os: Os) -> Option<&str> {
        self.0.get(locale)?.get(os.as_str()).map(String::as_str)
    }

    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

const BUILTIN: &[(&str, &str, &str, &str)] = &[
    (
        "en_us",
        "To add this web app to the home screen: tap %icon and then <strong>Add to Home Screen</strong>.",
        "To add this web app to the home screen open the browser option menu and tap on <strong>Add to homescreen</strong>. <small>The menu can be accessed by pressing the menu hardware button if your device has one, or by tapping the top right menu icon %icon.</small>",
        "To add this web app to the home screen open the browser option menu and tap on <strong>Pin to start</strong>.",
    ),
    (
        "de_de",
        "Um diese Web-App zum Home-Bildschirm hinzuzufügen, tippen Sie auf %icon und dann <strong>Zum Home-Bildschirm</strong>.",
        "Um diese Web-App zum Home-Bildschirm hinzuzufügen, öffnen Sie das Menü und tippen dann auf <strong>Zum Startbildschirm hinzufügen</strong>. <small>Wenn Ihr Gerät eine Menütaste hat, lässt sich das Browsermenü über diese öffnen. Ansonsten tippen Sie auf %icon.</small>",
        "Um diese Web-App zum Home-Bildschirm hinzuzufügen, öffnen Sie das Menü und tippen dann auf <strong>An Start anheften</strong>.",
    ),
    (
        "fr_fr",
        "Pour ajouter cette application web sur l'écran d'accueil : appuyez %icon et sélectionnez <strong>Ajouter sur l'écran d'accueil</strong>.",
        "Pour ajouter cette application web sur l'écran d'accueil : appuyez sur le bouton \"menu\", puis sur <strong>Ajouter sur l'écran d'accueil</strong>. <small>Le menu est accessible en appuyant sur le bouton \"menu\" du téléphone s'il en possède un, ou sur l'icône %icon.</small>",
        "Pour ajouter cette application web sur l'écran d'accueil, appuyez sur le bouton \"menu\", puis sur <strong>Épingler à l'écran d'accueil</strong>.",
    ),
    (
        "it_it",
        "Per aggiungere questa web app alla schermata iniziale: premi %icon e poi <strong>Aggiungi a Home</strong>.",
        "Per aggiungere questa web app alla schermata iniziale, apri il menu opzioni del browser e premi su <strong>Aggiungi alla homescreen</strong>. <small>Puoi accedere al menu premendo il pulsante hardware delle opzioni se la tua device ne ha uno, oppure premendo l'icona %icon in alto a destra.</small>",
        "Per aggiungere questa web app alla schermata iniziale, apri il menu opzioni del browser e premi su <strong>Aggiungi alla homescreen</strong>.",
    ),
];

/// Pick the template for this visitor.
///
/// Priority: per-locale-and-OS override, per-OS override, preset named by
/// a string message, the string itself, then the visitor's locale preset
/// (falling back to [`FALLBACK_LOCALE`]). An override that names the
/// locale or OS but lacks the entry falls through to the next rule.
pub fn resolve(message: &Message, table: &MessageTable, language: &str, os: Os) -> String {
    match message {
        Message::PerLocale(by_locale) => {
            if let Some(text) = by_locale.get(language).and_then(|m| m.get(os.as_str())) {
                return text.clone();
            }
        }
        Message::PerOs(by_os) => {
            if let Some(text) = by_os.get(os.as_str()) {
                return text.clone();
            }
        }
        Message::Text(text) if table.has_locale(text) => {
            if let Some(preset) = table.get(text, os) {
                return preset.to_string();
            }
        }
        Message::Text(text) if !text.is_empty() => return text.clone(),
        Message::Text(_) => {}
    }

    table
        .get(language, os)
        .or_else(|| table.get(FALLBACK_LOCALE, os))
        .unwrap_or_default()
        .to_string()
}

/// Wrap the template in a paragraph, replacing `%icon` / `%icon[label]`
/// with the action-icon span.
pub fn render_html(template: &str) -> String {
    let body = ICON_TOKEN.replace_all(template, |caps: &Captures<'_>| {
        let label = caps.get(1).map_or("icon", |m| m.as_str());
        format!(r#"<span class="ath-action-icon">{label}</span>"#)
    });
    format!("<p>{body}</p>")
}
