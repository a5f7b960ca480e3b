//! Regex entity extraction per agent kind.
//!
//! Matches are advisory: they end up in evaluation prompts and feed the
//! scientific agent's study lookup, nothing decides on them alone.

use once_cell::sync::Lazy;
use regex::Regex;

use newscheck_core::{AgentKind, Article, ExtractedEntities, PriorAnalysis};

pub const POLITICIANS: &str = "politicians";
pub const INSTITUTIONS: &str = "institutions";
pub const COMPANIES: &str = "companies";
pub const TECHNOLOGIES: &str = "technologies";
pub const INDICATORS: &str = "indicators";
pub const MARKETS: &str = "markets";
pub const PLACES: &str = "places";
pub const DATES: &str = "dates";
pub const AUTHORS: &str = "authors";
pub const STUDIES: &str = "studies";
pub const JOURNALS: &str = "journals";
pub const KEYWORDS: &str = "keywords";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("invalid entity regex")
}

static POLITICIAN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i:presidente|ministro|ministra|sindaco|governatore|president|minister|mayor|governor|senator)\s+(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)",
        r"(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)\s+(?i:ha\s+dichiarato|said|stated|announced)",
        r"(?i:dichiarazione\s+di|statement\s+by)\s+(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

static INSTITUTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(governo|parlamento|senato|camera dei deputati|ministero|comune|regione|partito|coalizione|opposizione|commissione|consiglio|government|parliament|senate|congress|ministry|party|coalition|opposition|commission|council)\b",
    )
});

static COMPANY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(google|apple|microsoft|amazon|meta|facebook|tesla|netflix|nvidia|openai|anthropic|samsung|uber|airbnb)\b",
        r"\b(\p{Lu}[\p{L}\d]+(?:\s+\p{Lu}[\p{L}\d]+)?)\s+(?:Inc|Corp|Labs|Technologies|Software)\b",
        r"(?i:startup|azienda|company)\s+(\p{Lu}[\p{L}\d]+(?:\s+\p{Lu}[\p{L}\d]+)?)",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

static TECHNOLOGY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(intelligenza artificiale|artificial intelligence|machine learning|deep learning|ai|blockchain|bitcoin|cryptocurrency|nft|cloud computing|cloud|saas|5g|6g|iot|internet of things|virtual reality|augmented reality|quantum computing)\b",
    )
});

static INDICATOR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(pil|gdp|inflazione|inflation|disoccupazione|unemployment|tasso di interesse|interest rate|debito pubblico|public debt|deficit|surplus|spread)\b",
    )
});

static MARKET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\b(borsa|stock exchange|ftse(?: mib)?|nasdaq|dow jones|s&p 500|euro|dollaro|dollar|sterlina|pound|yen|yuan)\b")
});

static PLACE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:a|in|da|at|near|from)\s+(\p{Lu}\p{Ll}+(?:\s+\p{Lu}\p{Ll}+)*)",
        r"(?i:città|paese|regione|provincia|city|region|province)\s+(?i:di|of)\s+(\p{Lu}\p{Ll}+)",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(\d{4}-\d{2}-\d{2}|\d{1,2}\s+(?:gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre|january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{4})\b",
    )
});

pub(crate) static AUTHOR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i:studio|ricerca|pubblicazione|paper|study|research|trial)\b[^.\n]{0,60}?\s(?i:di|by|led by|guidat[oa] da)\s+(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)",
        r"(?i:led by|guidat[oa] da|coordinat[oa] da)\s+(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)",
        r"(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)\s+(?i:ha\s+(?:scoperto|trovato|dimostrato)|et\s+al\b|found|showed|demonstrated)",
        r"(\p{Lu}\p{L}+\s+\p{Lu}\p{L}+)\s+(?i:studio|pubblicazione|paper|ricerca)\b",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

pub(crate) static STUDY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:studio|ricerca|pubblicazione|paper|study|research|trial)\s+(?:su|sulla|sul|sui|sulle|on|about|into|of)\s+([^,.;:\n]+)",
        r"(?i)([\p{L}\d-]+(?:\s+[\p{L}\d-]+){1,5})\s+(?:è|sono)\s+stat[ie]\s+(?:studiat|analizzat)[ioae]",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

pub(crate) static JOURNAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i:pubblicat[oa]|published)\s+(?i:su|in|on)\s+(?i:the\s+)?(\p{Lu}[\p{L}&]*(?:\s+(?:of\s+|\p{Lu})[\p{L}&]*){0,5})",
        r"(?i:rivista|journal)\s+(\p{Lu}[\p{L}&]*(?:\s+\p{Lu}[\p{L}&]*){0,5})",
    ]
    .into_iter()
    .map(compile)
    .collect()
});

const STUDY_KEYWORDS: &[&str] = &[
    "studio",
    "ricerca",
    "pubblicazione",
    "paper",
    "metodologia",
    "risultati",
    "esperimento",
    "study",
    "research",
    "methodology",
    "results",
    "experiment",
    "trial",
    "peer review",
];

/// Haystack scanned by every extractor.
pub fn corpus(article: &Article, analysis: &PriorAnalysis) -> String {
    format!("{}\n{}", article.searchable_text(), analysis.to_prompt_text())
}

pub fn extract(kind: AgentKind, article: &Article, analysis: &PriorAnalysis) -> ExtractedEntities {
    let text = corpus(article, analysis);
    let mut found = ExtractedEntities::new();
    match kind {
        AgentKind::Political => {
            found.insert(POLITICIANS, captured(&POLITICIAN_PATTERNS, &text));
            found.insert(INSTITUTIONS, matched(&INSTITUTION_PATTERN, &text));
        }
        AgentKind::Technological => {
            found.insert(COMPANIES, captured(&COMPANY_PATTERNS, &text));
            found.insert(TECHNOLOGIES, matched(&TECHNOLOGY_PATTERN, &text));
        }
        AgentKind::Economic => {
            found.insert(INDICATORS, matched(&INDICATOR_PATTERN, &text));
            found.insert(MARKETS, matched(&MARKET_PATTERN, &text));
        }
        AgentKind::Universal => {
            found.insert(PLACES, captured(&PLACE_PATTERNS, &text));
            found.insert(DATES, matched(&DATE_PATTERN, &text));
        }
        AgentKind::Scientific => extract_study(&text, &mut found),
    }
    found
}

/// Author, study topic and journal slots; also used on queries and evidence.
pub fn extract_study(text: &str, found: &mut ExtractedEntities) {
    found.insert(AUTHORS, first_capture(&AUTHOR_PATTERNS, text));
    found.insert(
        STUDIES,
        first_capture(&STUDY_PATTERNS, text)
            .map(|topic| trim_topic(&topic))
            .filter(|topic| topic.split_whitespace().count() >= 2),
    );
    found.insert(
        JOURNALS,
        first_capture(&JOURNAL_PATTERNS, text).map(|journal| journal.trim_end_matches(" of").to_string()),
    );

    let lowered = text.to_lowercase();
    found.insert(
        KEYWORDS,
        STUDY_KEYWORDS.iter().filter(|keyword| lowered.contains(*keyword)).copied(),
    );
}

/// Cut a captured topic where the sentence moves on to authors or venues.
fn trim_topic(topic: &str) -> String {
    const STOPS: &[&str] = &[" by ", " di ", " led ", " guidat", " published", " pubblicat", " was ", " è "];
    let lowered = topic.to_lowercase();
    let cut = STOPS
        .iter()
        .filter_map(|stop| lowered.find(stop))
        .min()
        .unwrap_or(topic.len());
    topic
        .get(..cut)
        .unwrap_or(topic)
        .split_whitespace()
        .take(8)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn captured(patterns: &[Regex], text: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

fn matched(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_from(kind: AgentKind, title: &str, body: &str) -> ExtractedEntities {
        extract(kind, &Article::new(title, body), &PriorAnalysis::default())
    }

    #[test]
    fn political_extraction_finds_people_and_institutions() {
        let found = extract_from(
            AgentKind::Political,
            "Ministro Mario Bianchi presenta la riforma",
            "Il governo e il parlamento discutono. Mario Bianchi ha dichiarato che la legge passerà.",
        );
        assert_eq!(found.get(POLITICIANS), &["Mario Bianchi".to_string()]);
        assert_eq!(found.get(INSTITUTIONS), &["governo".to_string(), "parlamento".to_string()]);
    }

    #[test]
    fn scientific_extraction_finds_author_topic_and_journal() {
        let found = extract_from(
            AgentKind::Scientific,
            "Vaccine trial succeeds",
            "A study on the XR-7 malaria vaccine by Maria Rossi was published in The Lancet last week.",
        );
        assert_eq!(found.get(AUTHORS), &["Maria Rossi".to_string()]);
        assert_eq!(found.get(STUDIES), &["the XR-7 malaria vaccine".to_string()]);
        assert_eq!(found.get(JOURNALS), &["Lancet".to_string()]);
        assert!(found.get(KEYWORDS).contains(&"study".to_string()));
    }

    #[test]
    fn economic_extraction_is_case_insensitive() {
        let found = extract_from(AgentKind::Economic, "GDP grows", "Inflation slows while the Nasdaq rallies.");
        assert_eq!(found.get(INDICATORS), &["gdp".to_string(), "inflation".to_string()]);
        assert_eq!(found.get(MARKETS), &["nasdaq".to_string()]);
    }

    #[test]
    fn universal_extraction_finds_places_and_dates() {
        let found = extract_from(AgentKind::Universal, "Flood", "Heavy rain hit Genova on 12 marzo 2024.");
        assert!(found.get(PLACES).is_empty());
        assert_eq!(found.get(DATES), &["12 marzo 2024".to_string()]);

        let found = extract_from(AgentKind::Universal, "Flood", "Heavy rain in Genova overnight.");
        assert_eq!(found.get(PLACES), &["Genova".to_string()]);
    }
}
