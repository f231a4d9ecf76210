//! The rendered callout. Class names are a contract with the stylesheet.

use serde::Serialize;

use crate::environment::Environment;
use crate::options::Config;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Markup {
    pub viewport_class: String,
    pub container_class: String,
    pub icon_src: Option<String>,
    pub message_html: String,
}

impl Markup {
    /// `icon_src` is the resolved application icon, if the option allows one.
    pub fn build(
        env: &Environment,
        config: &Config,
        icon_src: Option<String>,
        message_html: String,
    ) -> Self {
        let mut viewport_class = String::from("ath-viewport");
        if config.modal {
            viewport_class.push_str(" ath-modal");
        }
        if config.mandatory {
            viewport_class.push_str(" ath-mandatory");
        }

        let os = env.os.as_str();
        let major = env.major_version().map(|v| v.to_string()).unwrap_or_default();
        let form = if env.is_tablet { "tablet" } else { "phone" };
        let mut container_class = format!("ath-container ath-{os} ath-{os}{major} ath-{form}");
        if config.show_close {
            container_class.push_str(" ath-show-close");
        }
        if icon_src.is_some() {
            container_class.push_str(" ath-icon");
        }

        Self {
            viewport_class,
            container_class,
            icon_src,
            message_html,
        }
    }

    pub fn to_html(&self) -> String {
        let icon = self
            .icon_src
            .as_deref()
            .map(|src| {
                format!(
                    r#"<img class="ath-application-icon" src="{}">"#,
                    escape_attr(src)
                )
            })
            .unwrap_or_default();
        format!(
            r#"<div class="{}"><div class="{}">{}{}</div></div>"#,
            self.viewport_class, self.container_class, icon, self.message_html
        )
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
