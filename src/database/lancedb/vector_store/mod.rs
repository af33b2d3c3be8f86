
use super::EmbeddingRecord;
use crate::document::ChunkMetadata;
use crate::{RagError, Result};
use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::index::Index;
use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "chunks";

/// Below this many rows a flat scan beats training an ANN index
const ANN_INDEX_MIN_ROWS: usize = 512;

/// Read-only handle on a persisted chunk index
pub struct VectorStore {
    table: Table,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    /// Absent when the stored row carries no provenance columns
    pub metadata: Option<ChunkMetadata>,
    /// Cosine distance to the query, when the backend reports one
    pub distance: Option<f32>,
}

impl SearchResult {
    /// Similarity in the usual "higher is better" sense (1 - cosine distance)
    #[inline]
    pub fn similarity(&self) -> Option<f32> {
        self.distance.map(|d| 1.0 - d)
    }
}

impl VectorStore {
    /// Open an existing index.
    ///
    /// Fails with [`RagError::MissingIndex`] when nothing has been built at `path`.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(RagError::MissingIndex(path.to_path_buf()));
        }

        debug!("Opening LanceDB at path: {}", path.display());
        let connection = lancedb::connect(&path.to_string_lossy())
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(RagError::MissingIndex(path.to_path_buf()));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to open table: {}", e)))?;

        Ok(Self { table })
    }

    /// Build a fresh index at `path` from `records`, replacing whatever was there.
    ///
    /// The index is written to a staging directory beside `path` and moved into
    /// place only once complete, so a failed build leaves the previous index
    /// untouched and readers never observe a half-written table.
    #[inline]
    pub async fn build(
        path: &Path,
        dimension: usize,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::VectorStore(
                "Vector dimension must be greater than 0".to_string(),
            ));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(RagError::VectorStore(format!(
                "Record {} has dimension {}, expected {}",
                bad.id,
                bad.vector.len(),
                dimension
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let staging = sibling_path(path, "staging");
        if staging.exists() {
            warn!("Removing stale staging directory {}", staging.display());
            std::fs::remove_dir_all(&staging)?;
        }

        info!(
            "Building index with {} records ({} dimensions) in {}",
            records.len(),
            dimension,
            staging.display()
        );

        if let Err(e) = write_table(&staging, dimension, &records).await {
            if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    staging.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        swap_into_place(&staging, path)?;
        info!("Index written to {}", path.display());

        Self::open(path).await
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to count rows: {}", e)))
    }

    /// Length of the stored vectors, read from the table schema
    #[cfg(test)]
    async fn vector_dimension(&self) -> Result<usize> {
        let schema = self
            .table
            .schema()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to get table schema: {}", e)))?;

        match schema.field_with_name("vector").map(Field::data_type) {
            Ok(DataType::FixedSizeList(_, size)) => Ok(*size as usize),
            _ => Err(RagError::VectorStore(
                "Could not find vector column or determine dimension".to_string(),
            )),
        }
    }

    /// Return the `k` chunks nearest to `query_vector` by cosine distance.
    ///
    /// `fetch_k` sizes the candidate pool: when an ANN index is present,
    /// `ceil(fetch_k / k)` times `k` candidates are re-ranked exactly before
    /// the top `k` are kept.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        fetch_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let refine_factor = fetch_k.max(k).div_ceil(k);
        debug!(
            "Searching for {} nearest chunks (fetch_k {}, refine factor {})",
            k, fetch_k, refine_factor
        );

        let stream = self
            .table
            .vector_search(query_vector)
            .map_err(|e| RagError::VectorStore(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .refine_factor(u32::try_from(refine_factor).unwrap_or(u32::MAX))
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| RagError::VectorStore(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_search_batch(batch)?);
        }

        debug!("Parsed {} search results", results.len());
        Ok(results)
    }
}

fn create_schema(dimension: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, true),
        Field::new("page", DataType::UInt32, true),
        Field::new("chunk_index", DataType::UInt32, true),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(dimension: usize, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
    let flat_values: Vec<f32> = records
        .iter()
        .flat_map(|r| r.vector.iter().copied())
        .collect();
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::VectorStore(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.id.as_str()),
        )),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.content.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.source.as_str()),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.metadata.page),
        )),
        Arc::new(UInt32Array::from_iter_values(
            records.iter().map(|r| r.metadata.chunk_index),
        )),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.created_at.as_str()),
        )),
    ];

    RecordBatch::try_new(create_schema(dimension), arrays)
        .map_err(|e| RagError::VectorStore(format!("Failed to create record batch: {}", e)))
}

async fn write_table(dir: &Path, dimension: usize, records: &[EmbeddingRecord]) -> Result<()> {
    let connection = lancedb::connect(&dir.to_string_lossy())
        .execute()
        .await
        .map_err(|e| RagError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

    let table = connection
        .create_empty_table(TABLE_NAME, create_schema(dimension))
        .execute()
        .await
        .map_err(|e| RagError::VectorStore(format!("Failed to create table: {}", e)))?;

    if records.is_empty() {
        warn!("Building an empty index");
        return Ok(());
    }

    let batch = create_record_batch(dimension, records)?;
    let schema = batch.schema();
    let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
    table
        .add(reader)
        .execute()
        .await
        .map_err(|e| RagError::VectorStore(format!("Failed to insert embeddings: {}", e)))?;

    if records.len() >= ANN_INDEX_MIN_ROWS {
        debug!("Creating vector index for improved search performance");
        let index = Index::IvfPq(IvfPqIndexBuilder::default().distance_type(DistanceType::Cosine));
        match table.create_index(&["vector"], index).execute().await {
            Ok(()) => info!("Vector index created successfully"),
            Err(e) => warn!("Failed to create vector index, searches will scan: {}", e),
        }
    }

    Ok(())
}

/// Move a finished staging directory to `target`, displacing any previous index
fn swap_into_place(staging: &Path, target: &Path) -> Result<()> {
    let backup = sibling_path(target, "previous");

    if target.exists() {
        if backup.exists() {
            std::fs::remove_dir_all(&backup)?;
        }
        std::fs::rename(target, &backup)?;
        if let Err(e) = std::fs::rename(staging, target) {
            warn!("Failed to move new index into place, restoring previous index");
            std::fs::rename(&backup, target)?;
            return Err(e.into());
        }
    } else {
        std::fs::rename(staging, target)?;
        if backup.exists() {
            // Left behind by a build interrupted between the two renames
            warn!("Removing stale previous index {}", backup.display());
        }
    }

    match std::fs::remove_dir_all(&backup) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => warn!(
            "Failed to remove previous index at {}: {}",
            backup.display(),
            e
        ),
        _ => {}
    }
    Ok(())
}

/// `<dir>/<name>.<suffix>` next to `path`
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "index".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!("{}.{}", name, suffix))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let contents = string_column(batch, "content")
        .ok_or_else(|| RagError::VectorStore("Missing content column".to_string()))?;
    let sources = string_column(batch, "source");
    let pages = u32_column(batch, "page");
    let chunk_indices = u32_column(batch, "chunk_index");
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| {
            let metadata = match (sources, pages, chunk_indices) {
                (Some(s), Some(p), Some(c)) if !s.is_null(row) && !p.is_null(row) => {
                    Some(ChunkMetadata {
                        source: s.value(row).to_string(),
                        page: p.value(row),
                        chunk_index: if c.is_null(row) { 0 } else { c.value(row) },
                    })
                }
                _ => None,
            };

            SearchResult {
                content: contents.value(row).to_string(),
                metadata,
                distance: distances.filter(|d| !d.is_null(row)).map(|d| d.value(row)),
            }
        })
        .collect();

    Ok(results)
}
