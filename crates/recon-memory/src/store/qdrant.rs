//! Qdrant-backed vector storage

use super::{BackendError, ChunkRecord, RetrievedChunk, VectorBackend, COLLECTION_NAME};
use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: usize,
}

impl QdrantBackend {
    /// Connect and make sure the collection exists at the given dimension.
    pub async fn connect(url: &str, dimension: usize) -> Result<Self, BackendError> {
        debug!("connecting to qdrant at {}", url);

        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| BackendError(e.to_string()))?;

        let backend = Self {
            client,
            collection: COLLECTION_NAME.to_string(),
            dimension,
        };
        backend.ensure_collection().await?;
        Ok(backend)
    }

    async fn ensure_collection(&self) -> Result<(), BackendError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| BackendError(e.to_string()))?;
        if exists {
            return Ok(());
        }

        info!(
            "creating collection {} with dimension {}",
            self.collection, self.dimension
        );
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.dimension as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| BackendError(e.to_string()))?;
        Ok(())
    }

    fn to_point(record: ChunkRecord) -> PointStruct {
        // Qdrant point ids must be UUIDs; derive one deterministically from
        // the stable chunk key so re-ingestion upserts in place.
        let point_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, record.key.as_bytes()).to_string();

        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("chunk_key".to_string(), string_value(&record.key));
        payload.insert("text".to_string(), string_value(&record.text));
        payload.insert("title".to_string(), string_value(&record.title));
        payload.insert(
            "conversation_id".to_string(),
            QdrantValue {
                kind: Some(Kind::IntegerValue(record.conversation_id)),
            },
        );
        payload.insert(
            "timestamp".to_string(),
            string_value(&record.timestamp.to_rfc3339()),
        );

        PointStruct::new(point_id, record.vector, payload)
    }
}

fn string_value(s: &str) -> QdrantValue {
    QdrantValue {
        kind: Some(Kind::StringValue(s.to_string())),
    }
}

fn payload_str(payload: &HashMap<String, QdrantValue>, key: &str) -> String {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

fn payload_i64(payload: &HashMap<String, QdrantValue>, key: &str) -> i64 {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i,
        _ => 0,
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn add(&self, records: Vec<ChunkRecord>) -> Result<(), BackendError> {
        if records.is_empty() {
            return Ok(());
        }

        debug!(
            "upserting {} points into collection {}",
            records.len(),
            self.collection
        );

        let points: Vec<PointStruct> = records.into_iter().map(Self::to_point).collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| BackendError(e.to_string()))?;
        Ok(())
    }

    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        conversation_id: Option<i64>,
    ) -> Result<Vec<RetrievedChunk>, BackendError> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, vector, top_k as u64).with_payload(true);

        if let Some(id) = conversation_id {
            builder = builder.filter(Filter {
                must: vec![Condition::matches("conversation_id", id)],
                ..Default::default()
            });
        }

        let response = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| BackendError(e.to_string()))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| RetrievedChunk {
                text: payload_str(&point.payload, "text"),
                score: point.score,
                title: payload_str(&point.payload, "title"),
                conversation_id: payload_i64(&point.payload, "conversation_id"),
            })
            .collect())
    }

    async fn reset(&self) -> Result<(), BackendError> {
        if self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| BackendError(e.to_string()))?
        {
            info!("deleting collection {}", self.collection);
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(|e| BackendError(e.to_string()))?;
        }
        self.ensure_collection().await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.client
            .health_check()
            .await
            .map(|_| ())
            .map_err(|e| BackendError(e.to_string()))
    }
}
