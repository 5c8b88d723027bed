//! Query expansion
//!
//! Optional, per §4.4: classify the query's intent, generate a handful of
//! template variants that probe different phrasings of the same need, and
//! average their embeddings into a centroid that is a broader search
//! target than the raw query embedding alone.

/// Coarse intent bucket used to pick expansion templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Definition,
    HowTo,
    Reasoning,
    Temporal,
    Lookup,
}

/// Classify a query's intent from surface patterns.
pub fn classify_intent(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();

    if lower.contains("how to") || lower.starts_with("how do") || lower.starts_with("steps") {
        return QueryIntent::HowTo;
    }
    if lower.starts_with("what is")
        || lower.starts_with("what are")
        || lower.starts_with("define")
        || lower.starts_with("explain")
    {
        return QueryIntent::Definition;
    }
    if lower.starts_with("why") || lower.contains("reason") || lower.contains("because") {
        return QueryIntent::Reasoning;
    }
    if lower.starts_with("when") || lower.contains("timeline") {
        return QueryIntent::Temporal;
    }
    QueryIntent::Lookup
}

/// Generate up to `max_variants` phrasing variants of `query`, always
/// including the original as the first entry.
pub fn expand_query(query: &str, max_variants: usize) -> Vec<String> {
    let intent = classify_intent(query);
    let clean = query.trim().trim_end_matches(['?', '.']);
    let mut variants = vec![query.to_string()];

    let templates: &[&str] = match intent {
        QueryIntent::Definition => &[
            "{q} is a concept that involves",
            "the definition of {q} in this context",
            "{q} refers to",
        ],
        QueryIntent::HowTo => &[
            "the steps to {q}",
            "to accomplish {q}, the approach is",
            "a procedure for {q}",
        ],
        QueryIntent::Reasoning => &[
            "the reason {q} happened",
            "{q} occurred because of",
            "the explanation for {q}",
        ],
        QueryIntent::Temporal => &[
            "when {q} occurred",
            "the timeline of {q}",
            "events related to {q} in order",
        ],
        QueryIntent::Lookup => &[
            "information about {q}",
            "facts related to {q}",
            "details about {q}",
        ],
    };

    for template in templates {
        if variants.len() >= max_variants {
            break;
        }
        variants.push(template.replace("{q}", clean));
    }

    variants
}

/// Average multiple embeddings into their centroid.
pub fn centroid_embedding(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = embeddings.first()?.len();
    if dim == 0 {
        return None;
    }
    let mut centroid = vec![0.0f32; dim];
    let mut count = 0usize;
    for embedding in embeddings {
        if embedding.len() != dim {
            continue;
        }
        for (acc, v) in centroid.iter_mut().zip(embedding) {
            *acc += v;
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    for v in &mut centroid {
        *v /= count as f32;
    }
    Some(centroid)
}
