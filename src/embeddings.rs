//! Embedding resolution and vector math.
//!
//! Vectors are fetched either from a local tab-separated file
//! (`id\tfloat\tfloat...`, one entity per line) or from a remote lookup
//! service (HTTP GET `<base_url><id>`, JSON body with a `found` flag and a
//! whitespace-delimited `_source.embedding` field). Identifiers with no
//! vector are simply absent from the result map; callers treat that as a
//! valid "no embedding available" state.

use crate::error::{LinkerError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Mapping from entity identifier to embedding vector.
pub type VectorMap = HashMap<String, Vec<f64>>;

/// Where embedding vectors come from.
#[derive(Debug, Clone)]
pub enum EmbeddingSource {
    /// Local tab-separated file, scanned once.
    File(PathBuf),
    /// Remote lookup service; one GET per identifier, issued serially.
    Remote { base_url: String },
}

/// Abort policy for remote lookups.
///
/// Bounds the cost of a clearly-broken endpoint: once more than
/// `max_failures` lookups have completed without a single success, the
/// resolution fails. After the first success, misses are tolerated
/// indefinitely.
#[derive(Debug, Clone)]
pub struct LookupPolicy {
    pub max_failures: usize,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self { max_failures: 100 }
    }
}

/// Response body of the remote lookup service.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    found: bool,
    #[serde(rename = "_source")]
    source: Option<LookupSource>,
}

#[derive(Debug, Deserialize)]
struct LookupSource {
    embedding: String,
}

/// Resolves embedding vectors for a set of entity identifiers.
pub struct EmbeddingResolver {
    source: EmbeddingSource,
    policy: LookupPolicy,
    client: Client,
}

impl EmbeddingResolver {
    /// Create a resolver with the default lookup policy.
    pub fn new(source: EmbeddingSource) -> Self {
        Self::with_policy(source, LookupPolicy::default())
    }

    /// Create a resolver with an explicit lookup policy.
    pub fn with_policy(source: EmbeddingSource, policy: LookupPolicy) -> Self {
        Self {
            source,
            policy,
            client: Client::new(),
        }
    }

    /// Resolve vectors for every identifier found.
    ///
    /// Identifiers not found are absent from the returned map, not an
    /// error.
    pub async fn resolve(&self, ids: &HashSet<String>) -> Result<VectorMap> {
        match &self.source {
            EmbeddingSource::File(path) => self.resolve_from_file(path.clone(), ids),
            EmbeddingSource::Remote { base_url } => self.resolve_remote(base_url, ids).await,
        }
    }

    /// Single pass over the embedding file, retaining only requested ids.
    fn resolve_from_file(&self, path: PathBuf, ids: &HashSet<String>) -> Result<VectorMap> {
        let file = std::fs::File::open(&path).map_err(|e| LinkerError::io(&path, e))?;
        let reader = BufReader::new(file);

        let mut vectors = VectorMap::new();
        for line in reader.lines() {
            let line = line.map_err(|e| LinkerError::io(&path, e))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut fields = line.split('\t');
            let id = fields.next().unwrap_or_default();
            if !ids.contains(id) {
                continue;
            }

            let vector = fields
                .map(|f| {
                    f.parse::<f64>().map_err(|_| {
                        LinkerError::Parse(format!(
                            "bad float '{}' in embedding file for '{}'",
                            f, id
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            vectors.insert(id.to_string(), vector);
        }

        Ok(vectors)
    }

    /// Serial remote lookups with the bounded-failure abort policy.
    async fn resolve_remote(&self, base_url: &str, ids: &HashSet<String>) -> Result<VectorMap> {
        let mut vectors = VectorMap::new();
        let mut found_one = false;

        for (attempts, id) in ids.iter().enumerate() {
            let url = format!("{}{}", base_url, id);
            let response = self.client.get(&url).send().await?;

            if response.status().is_success() {
                let body: LookupResponse = response.json().await?;
                if body.found {
                    if let Some(source) = body.source {
                        vectors.insert(id.clone(), parse_embedding_field(&source.embedding)?);
                        found_one = true;
                    }
                }
            }

            if attempts >= self.policy.max_failures && !found_one {
                return Err(LinkerError::Resolution(format!(
                    "failing to find vectors: {} {}",
                    base_url, id
                )));
            }
        }

        if !found_one {
            return Err(LinkerError::Resolution(format!(
                "failed to find any vectors: {}",
                base_url
            )));
        }

        Ok(vectors)
    }
}

/// Parse a whitespace-delimited embedding field into a vector.
fn parse_embedding_field(field: &str) -> Result<Vec<f64>> {
    field
        .split_whitespace()
        .map(|f| {
            f.parse::<f64>()
                .map_err(|_| LinkerError::Parse(format!("bad float '{}' in embedding field", f)))
        })
        .collect()
}

/// Cosine similarity between two vectors: 1.0 for identical direction.
///
/// Degenerate inputs (length mismatch, zero norm) yield 0.0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Euclidean distance between two vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Element-wise mean of a set of vectors; `None` for an empty set.
pub fn centroid(vectors: &[&[f64]]) -> Option<Vec<f64>> {
    let first = vectors.first()?;
    let mut mean = vec![0.0; first.len()];
    for vector in vectors {
        for (m, v) in mean.iter_mut().zip(vector.iter()) {
            *m += v;
        }
    }
    let n = vectors.len() as f64;
    for m in &mut mean {
        *m /= n;
    }
    Some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 1e-9);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-9);
        assert_eq!(euclidean_distance(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_centroid_mean_and_empty() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        let mean = centroid(&[&a, &b]).unwrap();
        assert_eq!(mean, vec![0.5, 0.5]);

        assert!(centroid(&[]).is_none());
    }

    #[test]
    fn test_centroid_is_order_invariant() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        let c = vec![7.0, 8.0, 9.0];

        let forward = centroid(&[&a, &b, &c]).unwrap();
        let backward = centroid(&[&c, &a, &b]).unwrap();
        for (x, y) in forward.iter().zip(&backward) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[tokio::test]
    async fn test_file_mode_retains_only_requested_ids() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Q1\t1.0\t0.0").unwrap();
        writeln!(file, "Q2\t0.0\t1.0").unwrap();
        writeln!(file, "Q3\t0.5\t0.5").unwrap();

        let resolver =
            EmbeddingResolver::new(EmbeddingSource::File(file.path().to_path_buf()));
        let vectors = resolver.resolve(&ids(&["Q1", "Q2", "Q404"])).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors["Q1"], vec![1.0, 0.0]);
        assert_eq!(vectors["Q2"], vec![0.0, 1.0]);
        // Requested but unknown ids are absent, not an error.
        assert!(!vectors.contains_key("Q404"));
    }

    #[tokio::test]
    async fn test_file_mode_rejects_bad_floats() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Q1\tnot-a-float").unwrap();

        let resolver =
            EmbeddingResolver::new(EmbeddingSource::File(file.path().to_path_buf()));
        let result = resolver.resolve(&ids(&["Q1"])).await;
        assert!(matches!(result, Err(LinkerError::Parse(_))));
    }

    #[test]
    fn test_parse_embedding_field() {
        assert_eq!(
            parse_embedding_field("1.0 0.5  -2").unwrap(),
            vec![1.0, 0.5, -2.0]
        );
        assert!(parse_embedding_field("1.0 oops").is_err());
    }

    #[tokio::test]
    async fn test_remote_mode_found_and_missing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": true,
                "_source": { "embedding": "1.0 0.0" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/Q2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": false
            })))
            .mount(&server)
            .await;

        let resolver = EmbeddingResolver::new(EmbeddingSource::Remote {
            base_url: format!("{}/", server.uri()),
        });
        let vectors = resolver.resolve(&ids(&["Q1", "Q2"])).await.unwrap();

        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors["Q1"], vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_remote_mode_aborts_after_bounded_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resolver = EmbeddingResolver::with_policy(
            EmbeddingSource::Remote {
                base_url: format!("{}/", server.uri()),
            },
            LookupPolicy { max_failures: 2 },
        );
        let many: HashSet<String> = (0..10).map(|i| format!("Q{}", i)).collect();
        let result = resolver.resolve(&many).await;
        assert!(matches!(result, Err(LinkerError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_remote_mode_zero_successes_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "found": false })))
            .mount(&server)
            .await;

        let resolver = EmbeddingResolver::new(EmbeddingSource::Remote {
            base_url: format!("{}/", server.uri()),
        });
        let result = resolver.resolve(&ids(&["Q1", "Q2"])).await;
        assert!(matches!(result, Err(LinkerError::Resolution(_))));
    }

    #[tokio::test]
    async fn test_remote_mode_tolerates_misses_after_a_success() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "found": true,
                "_source": { "embedding": "0.5 0.5" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // The policy only bounds runs with no success at all; once one
        // vector is found, misses are fine.
        let resolver = EmbeddingResolver::with_policy(
            EmbeddingSource::Remote {
                base_url: format!("{}/", server.uri()),
            },
            LookupPolicy { max_failures: 1000 },
        );
        let vectors = resolver.resolve(&ids(&["Q1", "Q2", "Q3"])).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert!(vectors.contains_key("Q1"));
    }
}
