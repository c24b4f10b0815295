//! Result post-processing (§4.9): dedup by URL with a per-domain cap,
//! blocklist filtering, and embedding-similarity reranking.

use std::collections::HashSet;

use dr_core::EmbeddingModel;
use dr_graph::SearchHit;

/// Default per-domain cap on deduped results.
pub const DEFAULT_PER_DOMAIN_LIMIT: usize = 2;

fn normalize_domain(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
}

/// Drops repeat URLs and caps how many results may share one domain,
/// preserving input order (already provider-ranked).
#[must_use]
pub fn dedupe(results: Vec<SearchHit>, per_domain_limit: usize) -> Vec<SearchHit> {
    let mut seen_urls = HashSet::new();
    let mut domain_counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out = Vec::new();
    for hit in results {
        if !seen_urls.insert(hit.url.clone()) {
            continue;
        }
        if let Some(domain) = normalize_domain(&hit.url) {
            let count = domain_counts.entry(domain).or_insert(0);
            if *count >= per_domain_limit {
                continue;
            }
            *count += 1;
        }
        out.push(hit);
    }
    out
}

/// Drops results whose domain matches (or is a subdomain of) a blocked
/// entry, or whose title/snippet contains a blocked keyword.
#[must_use]
pub fn filter_blocked(results: Vec<SearchHit>, blocked_domains: &[String], blocked_keywords: &[String]) -> Vec<SearchHit> {
    if blocked_domains.is_empty() && blocked_keywords.is_empty() {
        return results;
    }
    results
        .into_iter()
        .filter(|hit| {
            if let Some(domain) = normalize_domain(&hit.url) {
                let blocked = blocked_domains
                    .iter()
                    .any(|b| domain == *b || domain.ends_with(&format!(".{b}")));
                if blocked {
                    return false;
                }
            }
            let haystack = format!("{} {}", hit.title, hit.snippet).to_lowercase();
            !blocked_keywords.iter().any(|kw| haystack.contains(kw.as_str()))
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Reranks `results` by cosine similarity of their title+snippet embedding
/// to the query embedding, keeping at most `top_k`. Falls back to the
/// provider's original order (truncated to `top_k`) if embedding any
/// result fails.
pub async fn rerank<E: EmbeddingModel>(
    embedder: &E,
    query: &str,
    results: Vec<SearchHit>,
    top_k: usize,
) -> Vec<SearchHit> {
    if results.is_empty() {
        return results;
    }
    let query_embedding = match embedder.embed(query).await {
        Ok(embedding) => embedding,
        Err(err) => {
            tracing::warn!(error = %err, "rerank query embedding failed, keeping provider order");
            return results.into_iter().take(top_k).collect();
        }
    };

    let mut scored = Vec::with_capacity(results.len());
    for hit in results {
        let text = format!("{} {}", hit.title, hit.snippet);
        match embedder.embed(&text).await {
            Ok(embedding) => {
                let score = cosine_similarity(&query_embedding, &embedding);
                scored.push((score, hit));
            }
            Err(err) => {
                tracing::warn!(url = %hit.url, error = %err, "rerank embedding failed for one result");
                scored.push((0.0, hit));
            }
        }
    }
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(top_k).map(|(_, hit)| hit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: String::new(),
            score: None,
            published_date: None,
        }
    }

    #[test]
    fn dedupe_drops_repeat_urls() {
        let results = vec![hit("https://a.com/1", "a"), hit("https://a.com/1", "a dup")];
        assert_eq!(dedupe(results, 2).len(), 1);
    }

    #[test]
    fn dedupe_caps_per_domain() {
        let results = vec![
            hit("https://a.com/1", "a"),
            hit("https://a.com/2", "a2"),
            hit("https://a.com/3", "a3"),
            hit("https://b.com/1", "b"),
        ];
        let out = dedupe(results, 2);
        assert_eq!(out.len(), 3);
        assert!(out.iter().filter(|h| h.url.contains("a.com")).count() == 2);
    }

    #[test]
    fn blocklist_drops_matching_domain_and_keyword() {
        let results = vec![
            hit("https://spam.example.com/x", "clean title"),
            hit("https://good.com/x", "has badword inside"),
            hit("https://good.com/y", "clean"),
        ];
        let out = filter_blocked(results, &["example.com".to_string()], &["badword".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://good.com/y");
    }
}
