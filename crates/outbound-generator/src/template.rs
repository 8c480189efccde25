// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Template-based content generation with a rule-based reviewer.
//!
//! Messages are rendered from fixed templates filled with recipient and
//! campaign details. The reviewer scores content against cold-email hygiene
//! rules (length, banned phrases, spam words, machine punctuation, call to
//! action count, personalization) and the rewriter mechanically repairs
//! whatever the rules flagged.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use outbound_core::traits::{ContentGenerator, PluginAdapter};
use outbound_core::types::{
    AdapterType, CampaignContext, DraftContent, HealthStatus, PriorSend, Recipient, ReviewResult,
};
use outbound_core::OutboundError;

/// Phrases that read as mass outreach. Any occurrence forces a rewrite.
pub const BANNED_PHRASES: &[&str] = &[
    "i hope this finds you well",
    "i hope this email finds you",
    "i'm reaching out",
    "i am reaching out",
    "reaching out to you",
    "i noticed that",
    "i noticed your",
    "i came across",
    "just wanted to",
    "i wanted to",
    "i'd love to",
    "must be tough",
    "sound familiar?",
    "you're probably",
    "most teams struggle",
    "touching base",
    "circling back",
    "just following up",
    "bumping this",
];

/// Words that trip spam filters.
pub const SPAM_WORDS: &[&str] = &[
    "free",
    "guarantee",
    "guaranteed",
    "promise",
    "amazing",
    "incredible",
    "unbelievable",
    "act now",
    "limited time",
    "urgent",
    "winner",
    "congratulations",
    "100%",
    "risk free",
    "no risk",
    "click here",
    "buy now",
    "order now",
    "special offer",
    "best price",
];

const BAD_SUBJECT_PATTERNS: &[&str] = &[
    "partnership",
    "opportunity",
    "meeting request",
    "introduction",
    "quick question",
    "following up",
    "checking in",
    "touching base",
];

const BAD_OPENERS: &[&str] = &[
    "i noticed",
    "i saw",
    "i came across",
    "i'm reaching out",
    "i am reaching out",
    "i wanted to",
    "i'd like to",
    "my name is",
    "hi,",
    "hello,",
    "dear ",
    "hope this",
];

const CTA_PHRASES: &[&str] = &[
    "worth a chat",
    "worth a quick chat",
    "interested?",
    "make sense?",
    "open to it?",
    "thoughts?",
    "worth exploring?",
    "happy to chat",
    "let me know",
    "schedule a call",
    "book a meeting",
];

/// Characters that mark text as machine-written.
const MACHINE_PUNCTUATION: &[(char, &str)] = &[('\u{2014}', ", "), ('\u{2013}', ", "), ('\u{2026}', "...")];

const DEFAULT_CTA: &str = "Worth a chat?";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{[a-z_]+\}").unwrap());

static ROUNDED_MULTIPLIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[234]x\b").unwrap());

static SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+[.!?]*").unwrap());

static BANNED: LazyLock<Regex> = LazyLock::new(|| phrase_regex(BANNED_PHRASES));

static SPAM: LazyLock<Regex> = LazyLock::new(|| phrase_regex(SPAM_WORDS));

static BAD_SUBJECT: LazyLock<Regex> = LazyLock::new(|| phrase_regex(BAD_SUBJECT_PATTERNS));

fn phrase_regex(phrases: &[&str]) -> Regex {
    let edge = |c: Option<char>| if c.is_some_and(char::is_alphanumeric) { r"\b" } else { "" };
    let alternation = phrases
        .iter()
        .map(|p| {
            format!(
                "{}{}{}",
                edge(p.chars().next()),
                regex::escape(p),
                edge(p.chars().last())
            )
        })
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&format!("(?:{alternation})"))
        .case_insensitive(true)
        .build()
        .unwrap()
}

/// Thresholds the reviewer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewRules {
    pub min_words: usize,
    pub max_words: usize,
    pub max_subject_words: usize,
}

impl Default for ReviewRules {
    fn default() -> Self {
        Self {
            min_words: 18,
            max_words: 75,
            max_subject_words: 6,
        }
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lowercase with every character other than letters, digits and `%`
/// replaced by a space, padded so whole-word lookups can use `" word "`.
fn normalized_words(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    for c in text.chars() {
        if c.is_alphanumeric() || c == '%' || c == '\'' {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.push(' ');
    out
}

fn count_ctas(body: &str) -> usize {
    let lower = body.to_ascii_lowercase();
    CTA_PHRASES.iter().filter(|cta| lower.contains(*cta)).count()
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

fn tidy(text: &str) -> String {
    text.split("\n\n")
        .map(|p| {
            let line = p.split_whitespace().collect::<Vec<_>>().join(" ");
            line.replace(" ,", ",")
                .replace(" .", ".")
                .replace(" ?", "?")
                .replace(",,", ",")
                .trim_start_matches([',', '.', ' '])
                .to_string()
        })
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn strip(regex: &Regex, text: &str) -> String {
    regex.replace_all(text, " ").into_owned()
}

fn split_sentences(paragraph: &str) -> Vec<&str> {
    SENTENCE
        .find_iter(paragraph)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Drop trailing sentences until the body fits `max_words`. The last
/// paragraph (the signature) is always kept.
fn shorten(body: &str, max_words: usize) -> String {
    let paragraphs: Vec<&str> = body.split("\n\n").collect();
    let (signature, rest) = match paragraphs.split_last() {
        Some((last, rest)) if !rest.is_empty() => (Some(*last), rest),
        _ => (None, paragraphs.as_slice()),
    };
    let mut budget = max_words.saturating_sub(signature.map_or(0, word_count));
    let mut kept = Vec::new();
    for paragraph in rest {
        let mut sentences = Vec::new();
        for sentence in split_sentences(paragraph) {
            let n = word_count(sentence);
            if n > budget {
                break;
            }
            budget -= n;
            sentences.push(sentence);
        }
        if !sentences.is_empty() {
            kept.push(sentences.join(" "));
        }
    }
    kept.extend(signature.map(str::to_string));
    kept.join("\n\n")
}

/// Keep only the last call to action.
fn single_cta(body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    let mut hits: Vec<(usize, usize)> = CTA_PHRASES
        .iter()
        .filter_map(|cta| lower.rfind(cta).map(|at| (at, cta.len())))
        .collect();
    hits.sort_unstable();
    hits.pop();
    let mut out = body.to_string();
    for (at, mut len) in hits.into_iter().rev() {
        if out[at + len..].starts_with('?') {
            len += 1;
        }
        out.replace_range(at..at + len, "");
    }
    out
}

/// Insert `sentence` as its own paragraph before the signature.
fn insert_before_signature(body: &str, sentence: &str) -> String {
    match body.rsplit_once("\n\n") {
        Some((head, signature)) => format!("{head}\n\n{sentence}\n\n{signature}"),
        None => format!("{body}\n\n{sentence}"),
    }
}

struct Vars<'a> {
    greeting: &'a str,
    company: &'a str,
    description: String,
    sender_name: &'a str,
    sender_company: &'a str,
}

impl<'a> Vars<'a> {
    fn new(recipient: &'a Recipient, ctx: &'a CampaignContext) -> Self {
        let description = if ctx.description.trim().is_empty() {
            ctx.name.to_lowercase()
        } else {
            ctx.description.trim().trim_end_matches('.').to_string()
        };
        Self {
            greeting: recipient.first_name().unwrap_or("Hey"),
            company: recipient.company.as_deref().unwrap_or("your team"),
            description,
            sender_name: &ctx.sender_name,
            sender_company: &ctx.company,
        }
    }

    fn pairs(&self) -> [(&str, &str); 5] {
        [
            ("greeting", self.greeting),
            ("company", self.company),
            ("description", &self.description),
            ("sender_name", self.sender_name),
            ("sender_company", self.sender_company),
        ]
    }
}

const INITIAL_SUBJECT: &str = "idea for {company}";
const INITIAL_BODY: &str = "{greeting},\n\n{company} came up while I was researching teams in your space. \
At {sender_company} we work on {description}, and teams like yours usually see results within the first month.\n\n\
Worth a chat?\n\n{sender_name}";

const FOLLOWUP_BODY: &str = "{greeting}, one more note on my last email.\n\n\
We helped a team similar to {company} cut the time spent on {description} by 37% in six weeks. \
Happy to share how it worked.\n\nThoughts?\n\n{sender_name}";

const NEW_THREAD_SUBJECT: &str = "{company}, different angle";
const NEW_THREAD_BODY: &str = "{greeting}, trying a different angle since my earlier note may have missed the mark.\n\n\
If {description} is not a priority at {company} right now, no problem. \
If it is, a short call could save your team a few hours a week.\n\nOpen to it?\n\n{sender_name}";

/// Renders fixed templates and reviews them with [`ReviewRules`].
#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator {
    rules: ReviewRules,
}

impl TemplateGenerator {
    pub fn new(rules: ReviewRules) -> Self {
        Self { rules }
    }

    /// Score `content` for `recipient`. Pure; exposed for the `review` trait
    /// method and for tests.
    pub fn score(&self, content: &DraftContent, recipient: &Recipient) -> ReviewResult {
        let mut penalty = 0u32;
        let mut critical = false;
        let mut issues = Vec::new();
        let body = &content.body;
        let body_lower = body.to_lowercase();
        let words = normalized_words(body);

        if PLACEHOLDER.is_match(body) || PLACEHOLDER.is_match(&content.subject) {
            penalty += 30;
            critical = true;
            issues.push("placeholder: unresolved template variable".to_string());
        }

        let count = word_count(body);
        if count > self.rules.max_words {
            penalty += 15;
            critical = true;
            issues.push(format!("length: {count} words, maximum is {}", self.rules.max_words));
        } else if count < self.rules.min_words {
            penalty += 15;
            critical = true;
            issues.push(format!("length: {count} words, minimum is {}", self.rules.min_words));
        }

        for phrase in BANNED_PHRASES.iter().filter(|p| body_lower.contains(*p)) {
            penalty += 20;
            critical = true;
            issues.push(format!("banned_phrase: '{phrase}'"));
        }

        for (c, _) in MACHINE_PUNCTUATION {
            if body.contains(*c) || content.subject.contains(*c) {
                penalty += 25;
                critical = true;
                issues.push(format!("punctuation: contains '{c}'"));
            }
        }

        let subject_lower = content.subject.to_lowercase();
        let subject_words = word_count(&content.subject);
        if subject_words == 0 {
            penalty += 20;
            critical = true;
            issues.push("subject: empty".to_string());
        } else if subject_words > self.rules.max_subject_words {
            penalty += 10;
            issues.push(format!(
                "subject: {subject_words} words, keep it to {}",
                self.rules.max_subject_words
            ));
        }
        for pattern in BAD_SUBJECT_PATTERNS.iter().filter(|p| subject_lower.contains(*p)) {
            penalty += 15;
            critical = true;
            issues.push(format!("subject: contains '{pattern}'"));
        }

        let first_line = body_lower.lines().next().unwrap_or_default().trim().to_string();
        if let Some(opener) = BAD_OPENERS.iter().find(|o| first_line.starts_with(*o)) {
            penalty += 20;
            critical = true;
            issues.push(format!("opener: starts with '{}'", opener.trim()));
        }

        match count_ctas(body) {
            0 => {
                penalty += 10;
                issues.push("cta: no call to action".to_string());
            }
            1 => {}
            n => {
                penalty += 15;
                critical = true;
                issues.push(format!("cta: {n} calls to action, use one"));
            }
        }

        for word in SPAM_WORDS.iter().filter(|w| words.contains(&format!(" {w} "))) {
            penalty += 10;
            issues.push(format!("spam_word: '{word}'"));
        }

        if ROUNDED_MULTIPLIER.is_match(body) {
            penalty += 5;
            issues.push("numbers: use a specific multiplier, not a rounded one".to_string());
        }

        if let Some(company) = recipient.company.as_deref()
            && !company.trim().is_empty()
            && !body_lower.contains(&company.to_lowercase())
        {
            penalty += 10;
            issues.push(format!("personalization: body never mentions {company}"));
        }

        ReviewResult {
            score: 100u32.saturating_sub(penalty),
            must_rewrite: critical,
            issues,
        }
    }

    /// Repair everything [`TemplateGenerator::score`] can flag mechanically.
    pub fn repair(&self, content: &DraftContent, ctx: &CampaignContext) -> DraftContent {
        let mut body = content.body.clone();
        let mut subject = content.subject.clone();
        for (c, replacement) in MACHINE_PUNCTUATION {
            body = body
                .replace(&format!(" {c} "), &format!("{} ", replacement.trim_end()))
                .replace(*c, replacement);
            subject = subject.replace(*c, " ");
        }

        body = PLACEHOLDER.replace_all(&body, "").into_owned();
        body = strip(&BANNED, &body);
        body = strip(&SPAM, &body);
        body = tidy(&body);

        if word_count(&body) > self.rules.max_words {
            body = shorten(&body, self.rules.max_words);
        }
        body = match count_ctas(&body) {
            0 => insert_before_signature(&body, DEFAULT_CTA),
            1 => body,
            _ => tidy(&single_cta(&body)),
        };
        if word_count(&body) < self.rules.min_words {
            let filler = format!(
                "At {} we work on {}, and it usually pays off within the first month.",
                ctx.company,
                if ctx.description.trim().is_empty() {
                    ctx.name.to_lowercase()
                } else {
                    ctx.description.trim().trim_end_matches('.').to_string()
                }
            );
            body = insert_before_signature(&body, &filler);
        }

        subject = PLACEHOLDER.replace_all(&subject, "").into_owned();
        subject = strip(&BAD_SUBJECT, &subject);
        let mut subject_words: Vec<&str> = subject.split_whitespace().collect();
        subject_words.truncate(self.rules.max_subject_words);
        let mut subject = subject_words.join(" ");
        if subject.is_empty() {
            subject = "idea".to_string();
        }

        DraftContent {
            subject,
            body,
            body_html: None,
        }
    }
}

#[async_trait]
impl PluginAdapter for TemplateGenerator {
    fn name(&self) -> &str {
        "template-generator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }

    async fn health_check(&self) -> Result<HealthStatus, OutboundError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OutboundError> {
        Ok(())
    }
}

#[async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate_initial(
        &self,
        recipient: &Recipient,
        ctx: &CampaignContext,
    ) -> Result<Option<DraftContent>, OutboundError> {
        let vars = Vars::new(recipient, ctx);
        Ok(Some(DraftContent {
            subject: render(INITIAL_SUBJECT, &vars.pairs()),
            body: render(INITIAL_BODY, &vars.pairs()),
            body_html: None,
        }))
    }

    async fn generate_followup(
        &self,
        recipient: &Recipient,
        ctx: &CampaignContext,
        prior: &[PriorSend],
        sequence: u32,
    ) -> Result<Option<DraftContent>, OutboundError> {
        let Some(last) = prior.last() else {
            return Ok(None);
        };
        let vars = Vars::new(recipient, ctx);
        let content = match sequence {
            1 => {
                let subject = if last.subject.to_ascii_lowercase().starts_with("re:") {
                    last.subject.clone()
                } else {
                    format!("Re: {}", last.subject)
                };
                DraftContent {
                    subject,
                    body: render(FOLLOWUP_BODY, &vars.pairs()),
                    body_html: None,
                }
            }
            _ => DraftContent {
                subject: render(NEW_THREAD_SUBJECT, &vars.pairs()),
                body: render(NEW_THREAD_BODY, &vars.pairs()),
                body_html: None,
            },
        };
        Ok(Some(content))
    }

    async fn review(
        &self,
        content: &DraftContent,
        recipient: &Recipient,
    ) -> Result<ReviewResult, OutboundError> {
        Ok(self.score(content, recipient))
    }

    async fn rewrite(
        &self,
        content: &DraftContent,
        _review: &ReviewResult,
        ctx: &CampaignContext,
    ) -> Result<DraftContent, OutboundError> {
        Ok(self.repair(content, ctx))
    }
}
