//! Main-content selection policy.
//!
//! Containers are tried in order and the first match wins; boilerplate
//! subtrees are removed from whichever container was chosen. Both lists
//! come from config so atypical sites can be tuned without code changes.

use scraper::{ElementRef, Html, Selector};

use blogrefresh_shared::{
    BlogRefreshError, ExtractorConfig, Result, default_boilerplate_selectors,
    default_container_selectors,
};

/// Compiled container priority list and boilerplate selector.
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    containers: Vec<(String, Selector)>,
    boilerplate: Option<Selector>,
}

impl ExtractionPolicy {
    /// Compile a policy from selector strings.
    pub fn new<C, B>(containers: C, boilerplate: B) -> Result<Self>
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        let containers = containers
            .into_iter()
            .map(|s| {
                let s = s.as_ref().trim().to_string();
                compile(&s).map(|sel| (s, sel))
            })
            .collect::<Result<Vec<_>>>()?;

        let boilerplate: Vec<String> = boilerplate
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let boilerplate = if boilerplate.is_empty() {
            None
        } else {
            Some(compile(&boilerplate.join(", "))?)
        };

        Ok(Self {
            containers,
            boilerplate,
        })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Self::new(&config.container_selectors, &config.boilerplate_selectors)
    }

    /// The container selector strings, in priority order.
    pub fn container_selectors(&self) -> impl Iterator<Item = &str> {
        self.containers.iter().map(|(s, _)| s.as_str())
    }

    /// First matching container, else `<body>`, else the root element.
    pub(crate) fn select_container<'a>(&self, doc: &'a Html) -> ElementRef<'a> {
        for (_, sel) in &self.containers {
            if let Some(el) = doc.select(sel).next() {
                return el;
            }
        }

        let body_sel = Selector::parse("body").expect("valid selector");
        doc.select(&body_sel)
            .next()
            .unwrap_or_else(|| doc.root_element())
    }

    pub(crate) fn boilerplate(&self) -> Option<&Selector> {
        self.boilerplate.as_ref()
    }
}

impl Default for ExtractionPolicy {
    fn default() -> Self {
        Self::new(default_container_selectors(), default_boilerplate_selectors())
            .expect("built-in selectors are valid")
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| BlogRefreshError::parse(format!("invalid selector '{selector}': {e:?}")))
}
