use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Resolves message codes to text, delegating to a parent source on a miss.
pub trait MessageSource: Send + Sync {
    /// Resolve `code` for `locale`, substituting `{0}`, `{1}`, ... with `args`.
    fn get_message(&self, code: &str, args: &[&str], locale: Option<&str>) -> Option<String>;

    fn parent_source(&self) -> Option<Arc<dyn MessageSource>> {
        None
    }

    /// Ignored by sources that cannot delegate.
    fn set_parent_source(&self, _parent: Option<Arc<dyn MessageSource>>) {}
}

/// Replace `{i}` placeholders with the matching argument.
///
/// The template is scanned once, so placeholders inside arguments are kept
/// as written. Placeholders without an argument stay in place.
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let argument = after.find('}').and_then(|close| {
            after[..close]
                .parse::<usize>()
                .ok()
                .and_then(|index| args.get(index))
                .map(|arg| (close, *arg))
        });
        match argument {
            Some((close, arg)) => {
                text.push_str(arg);
                rest = &after[close + 1..];
            }
            None => {
                text.push('{');
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

/// Installed when no `messageSource` component is defined. Resolves nothing
/// itself and hands every lookup to the parent container's source.
#[derive(Default)]
pub struct DelegatingMessageSource {
    parent: RwLock<Option<Arc<dyn MessageSource>>>,
}

impl DelegatingMessageSource {
    pub fn new(parent: Option<Arc<dyn MessageSource>>) -> Self {
        Self {
            parent: RwLock::new(parent),
        }
    }
}

impl MessageSource for DelegatingMessageSource {
    fn get_message(&self, code: &str, args: &[&str], locale: Option<&str>) -> Option<String> {
        let parent = self.parent.read().clone();
        parent.and_then(|parent| parent.get_message(code, args, locale))
    }

    fn parent_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.read().clone()
    }

    fn set_parent_source(&self, parent: Option<Arc<dyn MessageSource>>) {
        *self.parent.write() = parent;
    }
}

/// In-memory messages keyed by code and optional locale.
///
/// A lookup tries the exact locale, then the locale-independent message,
/// then the parent source.
#[derive(Default)]
pub struct StaticMessageSource {
    messages: DashMap<(String, String), String>,
    parent: RwLock<Option<Arc<dyn MessageSource>>>,
}

impl StaticMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&self, code: &str, locale: Option<&str>, template: &str) {
        self.messages.insert(
            (code.to_string(), locale.unwrap_or_default().to_string()),
            template.to_string(),
        );
    }

    pub fn with_message(self, code: &str, locale: Option<&str>, template: &str) -> Self {
        self.add_message(code, locale, template);
        self
    }

    fn lookup(&self, code: &str, locale: &str) -> Option<String> {
        self.messages
            .get(&(code.to_string(), locale.to_string()))
            .map(|entry| entry.value().clone())
    }
}

impl MessageSource for StaticMessageSource {
    fn get_message(&self, code: &str, args: &[&str], locale: Option<&str>) -> Option<String> {
        let local = locale
            .and_then(|locale| self.lookup(code, locale))
            .or_else(|| self.lookup(code, ""));
        match local {
            Some(template) => Some(format_message(&template, args)),
            None => {
                let parent = self.parent.read().clone();
                parent.and_then(|parent| parent.get_message(code, args, locale))
            }
        }
    }

    fn parent_source(&self) -> Option<Arc<dyn MessageSource>> {
        self.parent.read().clone()
    }

    fn set_parent_source(&self, parent: Option<Arc<dyn MessageSource>>) {
        *self.parent.write() = parent;
    }
}
