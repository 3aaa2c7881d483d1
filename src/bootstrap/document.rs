//! Page document abstraction and element polling
//!
//! Module initializers frequently run before the elements they bind to
//! have rendered. [`find_element`] and [`wait_for_element`] poll the
//! document on a fixed interval for a bounded time.

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default interval between element lookups
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default time to wait for an element
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5000);

/// Document parsing progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    /// Structure still being parsed
    Loading,
    /// Structure parsed, subresources may still load
    Interactive,
    /// Fully loaded
    Complete,
}

/// A rendered page element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            id: None,
            classes: vec![],
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Match against a single compound selector such as `div#inbox.active`
    pub fn matches(&self, selector: &str) -> bool {
        let Some(parsed) = Selector::parse(selector) else {
            return false;
        };

        if let Some(tag) = parsed.tag {
            if !tag.eq_ignore_ascii_case(&self.tag) {
                return false;
            }
        }
        if let Some(id) = parsed.id {
            if self.id.as_deref() != Some(id) {
                return false;
            }
        }
        parsed
            .classes
            .iter()
            .all(|class| self.classes.iter().any(|c| c == class))
    }
}

struct Selector<'a> {
    tag: Option<&'a str>,
    id: Option<&'a str>,
    classes: Vec<&'a str>,
}

impl<'a> Selector<'a> {
    fn parse(selector: &'a str) -> Option<Self> {
        let selector = selector.trim();
        if selector.is_empty() || selector.contains(char::is_whitespace) {
            return None;
        }

        let mut parsed = Selector {
            tag: None,
            id: None,
            classes: vec![],
        };

        // Split into segments, each starting at '#' or '.'
        let mut start = 0;
        let bytes = selector.as_bytes();
        for i in 1..=bytes.len() {
            if i < bytes.len() && bytes[i] != b'#' && bytes[i] != b'.' {
                continue;
            }
            let segment = &selector[start..i];
            match segment.as_bytes()[0] {
                b'#' if segment.len() > 1 => parsed.id = Some(&segment[1..]),
                b'.' if segment.len() > 1 => parsed.classes.push(&segment[1..]),
                b'#' | b'.' => return None,
                _ if start == 0 => parsed.tag = Some(segment),
                _ => return None,
            }
            start = i;
        }

        Some(parsed)
    }
}

/// The page a module initializes against
#[async_trait]
pub trait Document: Send + Sync {
    /// Current parsing progress
    fn ready_state(&self) -> ReadyState;

    /// Resolves once the structure has been parsed
    async fn content_loaded(&self);

    /// First element matching `selector`
    fn query_selector(&self, selector: &str) -> Option<Element>;
}

/// In-memory document whose elements appear as the page renders
pub struct PageDocument {
    elements: RwLock<Vec<Element>>,
    state: watch::Sender<ReadyState>,
}

impl PageDocument {
    /// A document still parsing
    pub fn loading() -> Self {
        let (state, _) = watch::channel(ReadyState::Loading);
        Self {
            elements: RwLock::new(vec![]),
            state,
        }
    }

    /// A document whose structure is already parsed
    pub fn parsed() -> Self {
        let doc = Self::loading();
        doc.set_ready_state(ReadyState::Interactive);
        doc
    }

    /// Advance the parsing state
    pub fn set_ready_state(&self, state: ReadyState) {
        self.state.send_replace(state);
    }

    /// Render an element into the page
    pub fn append(&self, element: Element) {
        self.elements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(element);
    }

    /// Remove all elements matching `selector`
    pub fn remove(&self, selector: &str) {
        self.elements
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| !e.matches(selector));
    }
}

#[async_trait]
impl Document for PageDocument {
    fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    async fn content_loaded(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as self, so this only ends on a state change
        let _ = rx.wait_for(|state| *state != ReadyState::Loading).await;
    }

    fn query_selector(&self, selector: &str) -> Option<Element> {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.matches(selector))
            .cloned()
    }
}

/// Polling bounds for element lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

/// Poll for the first element matching `selector`.
///
/// Checks immediately, then once per poll interval. Returns `None` and logs
/// a warning if nothing matches within `max_wait`.
pub async fn find_element(
    document: &dyn Document,
    selector: &str,
    options: WaitOptions,
) -> Option<Element> {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(options.poll_interval.max(Duration::from_millis(1)));

    loop {
        ticker.tick().await;
        if let Some(element) = document.query_selector(selector) {
            debug!("Found {} after {:?}", selector, started.elapsed());
            return Some(element);
        }
        if started.elapsed() >= options.max_wait {
            warn!(
                selector,
                waited_ms = options.max_wait.as_millis() as u64,
                "Element not found before timeout"
            );
            return None;
        }
    }
}

/// Invoke `callback` once with the first element matching `selector`.
///
/// Polling runs on a spawned task; if the element never appears the
/// callback is dropped without being called.
pub fn wait_for_element<F>(
    document: Arc<dyn Document>,
    selector: impl Into<String>,
    options: WaitOptions,
    callback: F,
) -> JoinHandle<()>
where
    F: FnOnce(Element) + Send + 'static,
{
    let selector = selector.into();
    tokio::spawn(async move {
        if let Some(element) = find_element(document.as_ref(), &selector, options).await {
            callback(element);
        }
    })
}
