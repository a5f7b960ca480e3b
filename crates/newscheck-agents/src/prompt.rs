//! Prompt assembly. Every prompt opens with a `[task:..]` header naming the
//! request so that logs and scripted doubles can tell requests apart.

use std::fmt::Write as _;

use newscheck_core::{AgentKind, Article, EvidenceBundle, ExtractedEntities, PriorAnalysis, QueryList};

pub const ROUTE_HEADER: &str = "[task:route]";
pub const ANALYSIS_HEADER: &str = "[task:critical-analysis]";

pub fn queries_header(kind: AgentKind) -> String {
    format!("[task:queries:{}]", kind.as_str())
}

pub fn evaluate_header(kind: AgentKind) -> String {
    format!("[task:evaluate:{}]", kind.as_str())
}

/// Where fallback template queries take their subject from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSubject {
    /// The title, up to six words.
    Title,
    /// The first four title words.
    Keywords,
}

/// Per-domain persona, checklist and fallback queries.
#[derive(Debug)]
pub struct Brief {
    pub kind: AgentKind,
    pub persona: &'static str,
    pub checklist: &'static [&'static str],
    pub subject: TemplateSubject,
    pub templates_it: [&'static str; 3],
    pub templates_en: [&'static str; 3],
}

impl Brief {
    /// Three deterministic queries built from the article title.
    pub fn template_queries(&self, article: &Article, language: &str) -> Vec<String> {
        let subject = template_subject(article, self.subject);
        let templates = if is_italian(language) {
            &self.templates_it
        } else {
            &self.templates_en
        };
        QueryList::normalize(templates.iter().map(|template| template.replace("{}", &subject)))
            .into_inner()
    }
}

const TITLE_WORDS: usize = 6;
const KEYWORD_WORDS: usize = 4;

fn template_subject(article: &Article, subject: TemplateSubject) -> String {
    let title = article.title.trim();
    let source = if title.is_empty() { article.body() } else { title };
    let words: Vec<&str> = source.split_whitespace().collect();
    let limit = match subject {
        TemplateSubject::Title if !title.is_empty() => TITLE_WORDS,
        _ => KEYWORD_WORDS,
    };
    let picked = words.iter().take(limit).copied().collect::<Vec<_>>().join(" ");
    if picked.is_empty() {
        "news".to_string()
    } else {
        picked
    }
}

pub fn is_italian(language: &str) -> bool {
    language.trim().eq_ignore_ascii_case("it")
}

fn language_name(language: &str) -> &str {
    match language.trim().to_ascii_lowercase().as_str() {
        "it" => "Italian",
        "en" => "English",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        _ => language,
    }
}

fn write_article(out: &mut String, article: &Article) {
    let _ = writeln!(out, "ARTICLE");
    let _ = writeln!(out, "Title: {}", article.title);
    let _ = writeln!(out, "Content: {}", article.body());
    let _ = writeln!(out, "Source: {}", if article.source.is_empty() { "N/A" } else { article.source.as_str() });
    if let Some(date) = &article.date {
        let _ = writeln!(out, "Date: {date}");
    }
    if let Some(author) = &article.author {
        let _ = writeln!(out, "Author: {author}");
    }
}

pub fn routing_prompt(article: &Article, analysis: &PriorAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{ROUTE_HEADER}");
    let _ = writeln!(
        out,
        "You coordinate specialized fact-checking agents. Pick the two or three agents best suited to verify this news item."
    );
    write_article(&mut out, article);
    let _ = writeln!(out, "\nPRIOR ANALYSIS\n{}", analysis.to_prompt_text());
    let _ = writeln!(out, "\nAGENTS");
    for kind in AgentKind::ALL {
        let _ = writeln!(out, "- {}: {}", kind.as_str(), agent_scope(kind));
    }
    let _ = writeln!(
        out,
        "\nScientific news (studies, research, discoveries) always pairs scientific with universal."
    );
    let _ = writeln!(
        out,
        "Return only JSON: {{\"agents\": [..], \"rationale\": \"..\", \"detected_traits\": [..], \"confidence_level\": 1-10, \"collaboration_strategy\": \"..\", \"entity_hints\": {{\"entities\": [..], \"events\": [..], \"sources\": [..], \"details\": [..]}}}}"
    );
    out
}

fn agent_scope(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Political => "government, elections, diplomacy, laws, institutions, political statements",
        AgentKind::Technological => "technology, AI, startups, software, digital products",
        AgentKind::Scientific => "studies, research, medicine, archaeology, scientific publications",
        AgentKind::Economic => "economy, finance, markets, companies, GDP, inflation",
        AgentKind::Universal => "general news, events, accidents, weather, anything else",
    }
}

pub fn queries_prompt(brief: &Brief, article: &Article, analysis: &PriorAnalysis, language: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", queries_header(brief.kind));
    let _ = writeln!(out, "{}", brief.persona);
    write_article(&mut out, article);
    let _ = writeln!(out, "\nPRIOR ANALYSIS\n{}", analysis.to_prompt_text());
    let _ = writeln!(
        out,
        "\nWrite 3 short web search queries (at most 12 words each) in {} that would confirm or refute the article.",
        language_name(language)
    );
    let _ = writeln!(out, "Return only a JSON array of strings.");
    out
}

/// Inputs of an evaluation prompt beyond the agent's brief.
pub struct EvaluationInput<'a> {
    pub article: &'a Article,
    pub queries: &'a [String],
    pub evidence: &'a EvidenceBundle,
    pub language: &'a str,
    pub hints: Option<&'a ExtractedEntities>,
    pub study_summary: Option<&'a str>,
}

pub fn evaluation_prompt(brief: &Brief, input: &EvaluationInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", evaluate_header(brief.kind));
    let _ = writeln!(out, "{}", brief.persona);
    write_article(&mut out, input.article);

    let _ = writeln!(out, "\nQUERIES");
    for query in input.queries {
        let _ = writeln!(out, "- {query}");
    }
    let _ = writeln!(out, "\nSEARCH RESULTS\n{}", input.evidence.to_prompt_text());

    if let Some(hints) = input.hints.filter(|hints| !hints.is_empty()) {
        let _ = writeln!(out, "\nEXTRACTED ENTITIES\n{}", hints.to_prompt_text());
    }
    if let Some(summary) = input.study_summary {
        let _ = writeln!(out, "\nSTUDY QUALITY\n{summary}");
    }

    let _ = writeln!(out, "\nCHECK");
    for item in brief.checklist {
        let _ = writeln!(out, "- {item}");
    }
    let _ = writeln!(
        out,
        "\nAnswer in {}. Return only JSON: {{\"confirmed\": bool, \"evidence_for\": [..], \"evidence_against\": [..], \"confidence\": 1-10, \"explanation\": \"..\"}}",
        language_name(input.language)
    );
    out
}

pub fn analysis_prompt(article: &Article, language: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{ANALYSIS_HEADER}");
    let _ = writeln!(
        out,
        "Read this news item critically before any search: judge its plausibility, list suspicious points and the scenarios that could explain it."
    );
    write_article(&mut out, article);
    let _ = writeln!(
        out,
        "\nAnswer in {}. Return only JSON: {{\"plausibility\": \"high|medium|low\", \"suspicious_points\": [..], \"scenarios\": [..], \"strategic_queries\": [..], \"credibility\": 1-10, \"recommendations\": [..]}}",
        language_name(language)
    );
    out
}
