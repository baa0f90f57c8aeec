//! LanceDB Vector Index - 로컬 ANN 벡터 인덱스
//!
//! 인덱스 이름 = LanceDB 테이블 이름. `id` 컬럼 기준 merge-insert로 upsert합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use super::vector::{check_dimension, RetrievalMatch, VectorEntry, VectorIndex};
use crate::error::IndexError;

const BACKEND: &str = "lancedb";

fn index_error(message: impl std::fmt::Display) -> IndexError {
    IndexError::new(BACKEND, message.to_string())
}

// ============================================================================
// LanceVectorIndex
// ============================================================================

/// LanceDB 벡터 인덱스 구현
///
/// Apache Arrow 기반 columnar 저장소. 테이블은 `open`에서 빈 테이블로 만들어 두고,
/// 이후 모든 쓰기는 merge-insert로 처리합니다.
pub struct LanceVectorIndex {
    table: Table,
    dimension: usize,
}

impl LanceVectorIndex {
    /// LanceDB 인덱스 열기 (테이블이 없으면 생성)
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `table_name` - 인덱스(테이블) 이름
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, table_name: &str, dimension: usize) -> Result<Self, IndexError> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| index_error(format!("Failed to create LanceDB directory: {}", e)))?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| index_error("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .map_err(|e| index_error(format!("Failed to connect to LanceDB: {}", e)))?;

        let table = open_or_create_table(&db, table_name, vector_schema(dimension)).await?;

        tracing::debug!("LanceDB index '{}' opened at {:?}", table_name, path);

        Ok(Self { table, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch, IndexError> {
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let doc_ids: Vec<&str> = entries
            .iter()
            .map(|e| e.metadata.source_doc_id.as_str())
            .collect();
        let seqs: Vec<u32> = entries.iter().map(|e| e.metadata.chunk_seq as u32).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.metadata.text.as_str()).collect();

        let flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.vector.iter().copied())
            .collect();

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat)) as Arc<dyn Array>,
            None,
        )
        .map_err(|e| index_error(format!("Failed to create vector array: {}", e)))?;

        RecordBatch::try_new(
            vector_schema(self.dimension),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(UInt32Array::from(seqs)),
                Arc::new(StringArray::from(texts)),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| index_error(format!("Failed to create RecordBatch: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn upsert(&self, entries: &[VectorEntry]) -> Result<usize, IndexError> {
        if entries.is_empty() {
            return Ok(0);
        }
        check_dimension(BACKEND, self.dimension, entries)?;

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // id 일치 → 교체, 불일치 → 삽입
        let mut merge = self.table.merge_insert(&["id"]);
        merge.when_matched_update_all(None).when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .map_err(|e| index_error(format!("Failed to upsert vectors: {}", e)))?;

        Ok(entries.len())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievalMatch>, IndexError> {
        if vector.len() != self.dimension {
            return Err(index_error(format!(
                "query dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        if top_k == 0 || self.count().await? == 0 {
            return Ok(vec![]);
        }

        let stream = self
            .table
            .vector_search(vector.to_vec())
            .map_err(|e| index_error(format!("Failed to create vector search: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| index_error(format!("Failed to execute vector search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| index_error(format!("Failed to read search results: {}", e)))?;

        let mut matches = Vec::new();

        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let doc_ids = string_column(&batch, "source_doc_id")?;
            let texts = string_column(&batch, "text")?;
            let seqs = batch
                .column_by_name("chunk_seq")
                .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
                .ok_or_else(|| index_error("Missing chunk_seq column"))?;
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| index_error("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                // 코사인 거리 → 코사인 유사도
                let score = 1.0 - distances.value(i);

                matches.push(RetrievalMatch {
                    id: ids.value(i).to_string(),
                    text: texts.value(i).to_string(),
                    score,
                    source_doc_id: doc_ids.value(i).to_string(),
                    chunk_seq: seqs.value(i) as usize,
                });
            }
        }

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| index_error(format!("Failed to count rows: {}", e)))
    }

    fn name(&self) -> &str {
        BACKEND
    }
}

/// 벡터 테이블 스키마
fn vector_schema(dimension: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("source_doc_id", DataType::Utf8, false),
        Field::new("chunk_seq", DataType::UInt32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
    ]))
}

/// 테이블 열기, 없으면 빈 테이블 생성
///
/// 다른 연결이 먼저 만든 경우(`TableAlreadyExists`)에는 다시 엽니다.
async fn open_or_create_table(db: &Connection, name: &str, schema: SchemaRef) -> Result<Table, IndexError> {
    match db.open_table(name).execute().await {
        Ok(table) => return Ok(table),
        Err(lancedb::Error::TableNotFound { .. }) => {}
        Err(e) => return Err(index_error(format!("Failed to open table '{}': {}", name, e))),
    }

    match db.create_empty_table(name, schema).execute().await {
        Ok(table) => {
            tracing::info!("Created LanceDB table '{}'", name);
            Ok(table)
        }
        Err(lancedb::Error::TableAlreadyExists { .. }) => db
            .open_table(name)
            .execute()
            .await
            .map_err(|e| index_error(format!("Failed to open table '{}': {}", name, e))),
        Err(e) => Err(index_error(format!("Failed to create table '{}': {}", name, e))),
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, IndexError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| index_error(format!("Missing {} column", name)))
}

// ============================================================================
// Tests
// ============================================================================
