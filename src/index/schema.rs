//! Declarative description of the chunk index.
//!
//! The schema is plain data; it is serialized as the index definition body
//! and sent unchanged on every run.

use serde::{Deserialize, Serialize};

/// Key field holding the chunk identifier.
pub const CHUNK_ID: &str = "CHUNK_ID";
/// File reference field.
pub const FILE_ID: &str = "FILE_ID";
/// Chunk text field.
pub const CHUNK: &str = "CHUNK";
/// Source file name field.
pub const FILE_NAME: &str = "FILE_NAME";
/// Embedding vector field.
pub const CHUNK_VECTOR: &str = "CHUNK_VECTOR";

/// Output dimension of the embedding deployment.
pub const EMBEDDING_DIMENSIONS: usize = 1536;
/// HNSW algorithm configuration name.
pub const HNSW_ALGORITHM: &str = "myHnsw";
/// Vector search profile bound to [`CHUNK_VECTOR`].
pub const HNSW_PROFILE: &str = "myHnswProfile";

/// Index definition: fields plus vector search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Field definitions, key field first.
    pub fields: Vec<SearchField>,
    /// Vector search algorithms and profiles.
    pub vector_search: VectorSearch,
}

/// Field data types used by the chunk index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// `Edm.String`
    #[serde(rename = "Edm.String")]
    String,
    /// `Collection(Edm.Single)`, the vector type.
    #[serde(rename = "Collection(Edm.Single)")]
    SingleCollection,
}

/// One field of the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    /// Field name.
    pub name: String,
    /// Field data type.
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Document key.
    #[serde(default)]
    pub key: bool,
    /// Returned in search results.
    #[serde(default)]
    pub retrievable: bool,
    /// Usable in filters.
    #[serde(default)]
    pub filterable: bool,
    /// Usable in `$orderby`.
    #[serde(default)]
    pub sortable: bool,
    /// Usable in facets.
    #[serde(default)]
    pub facetable: bool,
    /// Full-text (or vector) searchable.
    #[serde(default)]
    pub searchable: bool,
    /// Analyzer applied at index and query time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    /// Vector length, vector fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    /// Vector search profile, vector fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

impl SearchField {
    fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: FieldType::String,
            key: false,
            retrievable: true,
            filterable: false,
            sortable: false,
            facetable: false,
            searchable: true,
            analyzer: None,
            dimensions: None,
            vector_search_profile: None,
        }
    }

    fn vector(name: &str, dimensions: usize, profile: &str) -> Self {
        Self {
            field_type: FieldType::SingleCollection,
            dimensions: Some(dimensions),
            vector_search_profile: Some(profile.to_string()),
            ..Self::string(name)
        }
    }
}

/// Vector search configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSearch {
    /// Available ANN algorithms.
    pub algorithms: Vec<VectorAlgorithm>,
    /// Profiles binding fields to algorithms.
    pub profiles: Vec<VectorSearchProfile>,
}

/// Named ANN algorithm configuration; service defaults apply to its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorAlgorithm {
    /// Configuration name.
    pub name: String,
    /// Algorithm kind (`hnsw`).
    pub kind: String,
}

/// Named profile pointing at an algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorSearchProfile {
    /// Profile name.
    pub name: String,
    /// Algorithm configuration name.
    pub algorithm: String,
}

impl IndexSchema {
    /// Schema for chunk records: key, file reference, text, file name and vector.
    pub fn chunk_index(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![
                SearchField {
                    key: true,
                    filterable: true,
                    sortable: true,
                    analyzer: Some("keyword".to_string()),
                    ..SearchField::string(CHUNK_ID)
                },
                SearchField {
                    filterable: true,
                    sortable: true,
                    ..SearchField::string(FILE_ID)
                },
                SearchField::string(CHUNK),
                SearchField::string(FILE_NAME),
                SearchField::vector(CHUNK_VECTOR, EMBEDDING_DIMENSIONS, HNSW_PROFILE),
            ],
            vector_search: VectorSearch {
                algorithms: vec![VectorAlgorithm {
                    name: HNSW_ALGORITHM.to_string(),
                    kind: "hnsw".to_string(),
                }],
                profiles: vec![VectorSearchProfile {
                    name: HNSW_PROFILE.to_string(),
                    algorithm: HNSW_ALGORITHM.to_string(),
                }],
            },
        }
    }

    /// The field marked as document key.
    pub fn key_field(&self) -> Option<&SearchField> {
        self.fields.iter().find(|field| field.key)
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&SearchField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn chunk_index_serializes_to_service_definition() {
        let body = serde_json::to_value(IndexSchema::chunk_index("docs")).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "docs",
                "fields": [
                    {"name": "CHUNK_ID", "type": "Edm.String", "key": true, "retrievable": true,
                     "filterable": true, "sortable": true, "facetable": false, "searchable": true,
                     "analyzer": "keyword"},
                    {"name": "FILE_ID", "type": "Edm.String", "key": false, "retrievable": true,
                     "filterable": true, "sortable": true, "facetable": false, "searchable": true},
                    {"name": "CHUNK", "type": "Edm.String", "key": false, "retrievable": true,
                     "filterable": false, "sortable": false, "facetable": false, "searchable": true},
                    {"name": "FILE_NAME", "type": "Edm.String", "key": false, "retrievable": true,
                     "filterable": false, "sortable": false, "facetable": false, "searchable": true},
                    {"name": "CHUNK_VECTOR", "type": "Collection(Edm.Single)", "key": false,
                     "retrievable": true, "filterable": false, "sortable": false, "facetable": false,
                     "searchable": true, "dimensions": 1536, "vectorSearchProfile": "myHnswProfile"}
                ],
                "vectorSearch": {
                    "algorithms": [{"name": "myHnsw", "kind": "hnsw"}],
                    "profiles": [{"name": "myHnswProfile", "algorithm": "myHnsw"}]
                }
            })
        );
    }

    #[test]
    fn key_and_vector_fields_are_discoverable() {
        let schema = IndexSchema::chunk_index("docs");
        assert_eq!(schema.key_field().map(|f| f.name.as_str()), Some(CHUNK_ID));
        assert_eq!(
            schema.field(CHUNK_VECTOR).and_then(|f| f.dimensions),
            Some(EMBEDDING_DIMENSIONS)
        );
    }

    #[test]
    fn schema_is_deterministic() {
        assert_eq!(IndexSchema::chunk_index("docs"), IndexSchema::chunk_index("docs"));
    }
}
