//! Off-platform contact filter.
//!
//! Chat messages, offer descriptions and offer durations must not carry a
//! phone number, email address, link, social handle or an invitation to get
//! in touch elsewhere. The checks are deliberately coarse: a false positive
//! costs the user an edit, a false negative costs the platform the deal.
//!
//! Categories are evaluated in a fixed order and the first hit decides the
//! verdict. A pattern that fails to compile counts as a hit for its category.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    PhoneNumber,
    Email,
    Link,
    SocialHandle,
    ContactKeyword,
}

impl ViolationKind {
    /// Evaluation order.
    pub const ALL: [ViolationKind; 5] = [
        Self::PhoneNumber,
        Self::Email,
        Self::Link,
        Self::SocialHandle,
        Self::ContactKeyword,
    ];

    /// Stable rejection code returned to API clients.
    pub fn code(self) -> &'static str {
        match self {
            Self::PhoneNumber => "blocked_phone",
            Self::Email => "blocked_email",
            Self::Link => "blocked_link",
            Self::SocialHandle => "blocked_social_handle",
            Self::ContactKeyword => "blocked_contact_keyword",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Human-readable reason shown next to the rejected field.
    pub fn message(self) -> &'static str {
        match self {
            Self::PhoneNumber => "Numbers are not allowed here; phone numbers must stay on the platform",
            Self::Email => "Email addresses cannot be shared; use platform messages instead",
            Self::Link => "Links and website addresses cannot be shared",
            Self::SocialHandle => "Social media accounts and handles cannot be shared",
            Self::ContactKeyword => "Requests to contact outside the platform are not allowed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub violation: Option<ViolationKind>,
}

impl Verdict {
    const ALLOWED: Verdict = Verdict {
        allowed: true,
        violation: None,
    };

    fn blocked(kind: ViolationKind) -> Self {
        Self {
            allowed: false,
            violation: Some(kind),
        }
    }
}

// Western, Arabic-Indic and Extended Arabic-Indic digits.
const DIGIT: &str = r"[0-9\x{0660}-\x{0669}\x{06F0}-\x{06F9}]";

const EMAIL_PATTERN: &str = r"(?i)[\w.%+\-]+@[\w\-]+(?:\.[\w\-]+)*\.[a-z]{2,}";

const LINK_PATTERN: &str = r"(?i)(?:https?://|www\.)\S+|\b[a-z0-9][a-z0-9\-]*\.(?:com|net|org|io|me|co|sa|ae|eg|kw|qa|bh|om|jo|info|biz|app|dev|ly|link|xyz|site|online|store)\b";

const SOCIAL_PATTERN: &str = r"(?i)(?:^|[^\w.])@[a-z0-9_.]{2,}|\b(?:whats\s?app|telegram|instagram|insta|snapchat|snap|facebook|fb|twitter|tiktok|linkedin|skype|wechat|discord)\b|واتس|واتساب|تيليجرام|تلجرام|تليجرام|تلغرام|انستقرام|انستغرام|انستا|سناب|فيسبوك|فيس بوك|تويتر|تيك توك|لينكد";

const KEYWORD_PATTERN: &str = r"(?i)\b(?:call|contact|phone|mobile|cell|email me|text me|dm me|reach me)\b|اتصل|تواصل|هاتف|جوال|موبايل|رقمي|كلمني|راسلني";

struct Detector {
    kind: ViolationKind,
    pattern: Option<Regex>,
}

impl Detector {
    fn new(kind: ViolationKind, source: &str) -> Self {
        let pattern = match Regex::new(source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Moderation pattern for {:?} failed to compile, failing closed: {}", kind, e);
                None
            }
        };
        Self { kind, pattern }
    }

    fn matches(&self, text: &str) -> bool {
        match &self.pattern {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

fn detectors() -> &'static [Detector] {
    static DETECTORS: OnceLock<Vec<Detector>> = OnceLock::new();
    DETECTORS.get_or_init(|| {
        // Two or more adjacent digits, or seven spaced-out single digits.
        let phone = format!(r"{d}{{2,}}|(?:{d}[\s.\-]+){{6,}}{d}", d = DIGIT);
        vec![
            Detector::new(ViolationKind::PhoneNumber, &phone),
            Detector::new(ViolationKind::Email, EMAIL_PATTERN),
            Detector::new(ViolationKind::Link, LINK_PATTERN),
            Detector::new(ViolationKind::SocialHandle, SOCIAL_PATTERN),
            Detector::new(ViolationKind::ContactKeyword, KEYWORD_PATTERN),
        ]
    })
}

/// Classifies `text`, stopping at the first violated category.
pub fn classify(text: &str) -> Verdict {
    detectors()
        .iter()
        .find(|d| d.matches(text))
        .map(|d| Verdict::blocked(d.kind))
        .unwrap_or(Verdict::ALLOWED)
}

/// Every category `text` violates, in evaluation order.
pub fn violations(text: &str) -> Vec<ViolationKind> {
    detectors()
        .iter()
        .filter(|d| d.matches(text))
        .map(|d| d.kind)
        .collect()
}

/// Classifies several named fields at once (offer description, duration, ...).
/// Returns the rejected fields with their first violation.
pub fn check_fields<'a, I>(fields: I) -> Vec<(&'a str, ViolationKind)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    fields
        .into_iter()
        .filter_map(|(name, text)| classify(text).violation.map(|kind| (name, kind)))
        .collect()
}
