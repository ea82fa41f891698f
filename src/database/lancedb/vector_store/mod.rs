
use super::EmbeddingRecord;
use crate::embeddings::{Chunk, Embedder};
use crate::vault::ContentType;
use crate::{LoreError, config::Config};
use arrow::array::{
    Array, BooleanArray, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const TABLE_NAME: &str = "chunks";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the store under the configured base directory
    #[inline]
    pub async fn open(config: &Config) -> Result<Self, LoreError> {
        Self::open_at(
            &config.vector_database_path(),
            config.ollama.embedding_dimension as usize,
        )
        .await
    }

    /// Open (or create) a store at `db_path`
    ///
    /// `vector_dimension` is only used when the table has to be created; an
    /// existing table keeps the dimension it was written with.
    #[inline]
    pub async fn open_at(db_path: &Path, vector_dimension: usize) -> Result<Self, LoreError> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            LoreError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        // Attempt to connect with corruption recovery
        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                if looks_corrupted(&e.to_string()) {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        LoreError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(LoreError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            vector_dimension,
        };

        store.initialize_table().await?;

        info!("Vector store initialized successfully");
        Ok(store)
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    /// Create the chunks table if missing, or adopt the dimension of the existing one
    async fn initialize_table(&mut self) -> Result<(), LoreError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Chunks table already exists, detecting vector dimension");
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    self.vector_dimension = dim;
                    info!("Detected existing vector dimension: {}", dim);
                }
                Err(e) => {
                    warn!(
                        "Could not detect vector dimension from existing table: {}",
                        e
                    );
                }
            }
            return Ok(());
        }

        self.create_table(self.vector_dimension).await
    }

    async fn create_table(&self, vector_dim: usize) -> Result<(), LoreError> {
        let schema = Self::create_schema(vector_dim);

        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to create table: {}", e)))?;

        info!("Chunks table created with {} dimensions", vector_dim);
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, LoreError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to open existing table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return usize::try_from(*size)
                        .map_err(|_| LoreError::Database("Negative vector dimension".to_string()));
                }
            }
        }

        Err(LoreError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("display_title", DataType::Utf8, false),
            Field::new("file_title", DataType::Utf8, false),
            Field::new("section_title", DataType::Utf8, false),
            Field::new("section_level", DataType::UInt32, false),
            Field::new("is_section", DataType::Boolean, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("folder", DataType::Utf8, false),
            Field::new("content_type", DataType::Utf8, false),
            Field::new("tags", DataType::Utf8, false),
            Field::new("links", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Drop every stored chunk; the next build starts from an empty table
    #[inline]
    pub async fn reset(&mut self) -> Result<(), LoreError> {
        info!("Resetting vector store");
        self.drop_table_if_exists().await?;
        self.create_table(self.vector_dimension).await
    }

    /// Embed and store `chunks` in batches of `batch_size`.
    ///
    /// Every batch is embedded before anything is written, so an embedder
    /// failure leaves the table as it was. Returns the number of chunks
    /// written.
    #[inline]
    pub async fn index<E: Embedder + ?Sized>(
        &mut self,
        chunks: &[Chunk],
        embedder: &E,
        batch_size: usize,
    ) -> Result<usize, LoreError> {
        let records = Self::embed_chunks(chunks, embedder, batch_size).await?;
        self.write_records(&records, batch_size).await
    }

    /// Embed the index text of every chunk, one bounded batch at a time
    #[inline]
    pub async fn embed_chunks<E: Embedder + ?Sized>(
        chunks: &[Chunk],
        embedder: &E,
        batch_size: usize,
    ) -> Result<Vec<EmbeddingRecord>, LoreError> {
        if chunks.is_empty() {
            debug!("No chunks to embed");
            return Ok(Vec::new());
        }

        let batch_size = batch_size.max(1);
        let bar = progress_bar(chunks.len() as u64);
        let mut records = Vec::with_capacity(chunks.len());

        for (batch_number, batch) in chunks.chunks(batch_size).enumerate() {
            debug!(
                "Embedding batch {} ({} chunks)",
                batch_number + 1,
                batch.len()
            );

            let texts: Vec<String> = batch.iter().map(Chunk::index_text).collect();
            let vectors = embedder.embed_texts(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(LoreError::Embedding(format!(
                    "Expected {} embeddings, received {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            records.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddingRecord::new(chunk.clone(), vector)),
            );
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        Ok(records)
    }

    /// Write already-embedded records, awaiting each batch before the next
    #[inline]
    pub async fn write_records(
        &mut self,
        records: &[EmbeddingRecord],
        batch_size: usize,
    ) -> Result<usize, LoreError> {
        let mut written = 0;

        for batch in records.chunks(batch_size.max(1)) {
            self.store_embeddings_batch(batch).await?;
            written += batch.len();
        }

        info!("Indexed {} chunks", written);
        Ok(written)
    }

    /// Store multiple embeddings in a batch
    #[inline]
    pub async fn store_embeddings_batch(
        &mut self,
        records: &[EmbeddingRecord],
    ) -> Result<(), LoreError> {
        let Some(first) = records.first() else {
            debug!("No embeddings to store");
            return Ok(());
        };

        debug!("Storing batch of {} embeddings", records.len());

        let vector_dim = first.vector.len();
        if self.vector_dimension != vector_dim {
            if self.count().await? > 0 {
                return Err(LoreError::Database(format!(
                    "Embedding dimension {} does not match stored dimension {}",
                    vector_dim, self.vector_dimension
                )));
            }

            info!(
                "Vector dimension changed from {} to {}, recreating empty table",
                self.vector_dimension, vector_dim
            );
            self.drop_table_if_exists().await?;
            self.create_table(vector_dim).await?;
            self.vector_dimension = vector_dim;
        }

        let record_batch = self.create_record_batch(records)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to insert embeddings: {}", e)))?;

        debug!("Stored {} embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch, LoreError> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut display_titles = Vec::with_capacity(len);
        let mut file_titles = Vec::with_capacity(len);
        let mut section_titles = Vec::with_capacity(len);
        let mut section_levels = Vec::with_capacity(len);
        let mut is_sections = Vec::with_capacity(len);
        let mut paths = Vec::with_capacity(len);
        let mut folders = Vec::with_capacity(len);
        let mut content_types = Vec::with_capacity(len);
        let mut tags = Vec::with_capacity(len);
        let mut links = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(LoreError::Database(format!(
                    "Chunk {} has {} dimensions, expected {}",
                    record.chunk.id,
                    record.vector.len(),
                    vector_dim
                )));
            }

            let chunk = &record.chunk;
            ids.push(chunk.id.as_str());
            display_titles.push(chunk.display_title.as_str());
            file_titles.push(chunk.file_title.as_str());
            section_titles.push(chunk.section_title.as_str());
            section_levels.push(u32::from(chunk.section_level));
            is_sections.push(chunk.is_section);
            paths.push(chunk.path.as_str());
            folders.push(chunk.folder.as_str());
            content_types.push(chunk.content_type.as_str());
            tags.push(encode_set(&chunk.tags)?);
            links.push(encode_set(&chunk.links)?);
            contents.push(chunk.content.as_str());
            created_ats.push(record.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let schema = Self::create_schema(vector_dim);

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    LoreError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(display_titles)),
            Arc::new(StringArray::from(file_titles)),
            Arc::new(StringArray::from(section_titles)),
            Arc::new(UInt32Array::from(section_levels)),
            Arc::new(BooleanArray::from(is_sections)),
            Arc::new(StringArray::from(paths)),
            Arc::new(StringArray::from(folders)),
            Arc::new(StringArray::from(content_types)),
            Arc::new(StringArray::from(tags)),
            Arc::new(StringArray::from(links)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| LoreError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Embed `query` and return up to `limit` chunks scoring at least
    /// `score_threshold`, best first
    #[inline]
    pub async fn search<E: Embedder + ?Sized>(
        &self,
        query: &str,
        embedder: &E,
        limit: usize,
        score_threshold: f32,
        folder_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>, LoreError> {
        if limit == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed_query(query).await?;
        let results = self
            .search_similar(&query_vector, limit, folder_filter)
            .await?;

        let qualifying: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.similarity_score >= score_threshold)
            .collect();

        debug!(
            "{} results at or above threshold {}",
            qualifying.len(),
            score_threshold
        );
        Ok(qualifying)
    }

    /// Search for similar embeddings using cosine similarity
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
        folder_filter: Option<&str>,
    ) -> Result<Vec<SearchResult>, LoreError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to open table: {}", e)))?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| LoreError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(folder) = folder_filter {
            query = query.only_if(folder_predicate(folder));
        }

        let results = query
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        search_results.truncate(limit);
        Ok(search_results)
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, LoreError> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, LoreError> {
        let ids = string_column(batch, "id")?;
        let display_titles = string_column(batch, "display_title")?;
        let file_titles = string_column(batch, "file_title")?;
        let section_titles = string_column(batch, "section_title")?;
        let paths = string_column(batch, "path")?;
        let folders = string_column(batch, "folder")?;
        let content_types = string_column(batch, "content_type")?;
        let tags = string_column(batch, "tags")?;
        let links = string_column(batch, "links")?;
        let contents = string_column(batch, "content")?;

        let section_levels = batch
            .column_by_name("section_level")
            .ok_or_else(|| LoreError::Database("Missing section_level column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| LoreError::Database("Invalid section_level column type".to_string()))?;

        let is_sections = batch
            .column_by_name("is_section")
            .ok_or_else(|| LoreError::Database("Missing is_section column".to_string()))?
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| LoreError::Database("Invalid is_section column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut search_results = Vec::with_capacity(batch.num_rows());

        for row in 0..batch.num_rows() {
            let content_type = ContentType::parse(content_types.value(row)).ok_or_else(|| {
                LoreError::Database(format!(
                    "Unknown content type: {}",
                    content_types.value(row)
                ))
            })?;

            let chunk = Chunk {
                id: ids.value(row).to_string(),
                display_title: display_titles.value(row).to_string(),
                file_title: file_titles.value(row).to_string(),
                content: contents.value(row).to_string(),
                tags: decode_set(tags.value(row))?,
                links: decode_set(links.value(row))?,
                folder: folders.value(row).to_string(),
                content_type,
                section_title: section_titles.value(row).to_string(),
                section_level: u8::try_from(section_levels.value(row)).unwrap_or(0),
                is_section: is_sections.value(row),
                path: paths.value(row).to_string(),
            };

            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            // Cosine distance; higher similarity is better
            let similarity_score = 1.0 - distance;

            search_results.push(SearchResult {
                chunk,
                similarity_score,
                distance,
            });
        }

        Ok(search_results)
    }

    /// Get the total number of chunks stored
    #[inline]
    pub async fn count(&self) -> Result<u64, LoreError> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| LoreError::Database(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| LoreError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Move a corrupted store aside so a fresh one can be created.
    ///
    /// The old directory is kept under a timestamped backup name and never
    /// deleted; if it cannot be moved the open fails instead.
    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), LoreError> {
        if !db_path.exists() {
            return Ok(());
        }

        let backup_path = corruption_backup_path(db_path);
        std::fs::rename(db_path, &backup_path).map_err(|e| {
            LoreError::Database(format!(
                "Vector database at {} looks corrupted and could not be moved aside: {}",
                db_path.display(),
                e
            ))
        })?;

        warn!(
            "Corrupted vector database moved to {}; run `lorekeeper index` to rebuild",
            backup_path.display()
        );
        Ok(())
    }

    /// Drop the chunks table if it exists
    async fn drop_table_if_exists(&self) -> Result<(), LoreError> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                LoreError::Database(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.contains(&self.table_name) {
            debug!("Dropping existing chunks table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| LoreError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, LoreError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| LoreError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| LoreError::Database(format!("Invalid {} column type", name)))
}

fn encode_set(values: &BTreeSet<String>) -> Result<String, LoreError> {
    serde_json::to_string(values)
        .map_err(|e| LoreError::Database(format!("Failed to encode list column: {}", e)))
}

fn decode_set(raw: &str) -> Result<BTreeSet<String>, LoreError> {
    serde_json::from_str(raw)
        .map_err(|e| LoreError::Database(format!("Failed to decode list column: {}", e)))
}

/// SQL predicate matching one folder label exactly
/// Connect errors that mean the files on disk are damaged, as opposed to
/// permissions, paths or URIs being wrong
pub(crate) fn looks_corrupted(error: &str) -> bool {
    let error = error.to_lowercase();
    error.contains("corrupt") || error.contains("malformed")
}

pub(crate) fn corruption_backup_path(db_path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");
    let name = db_path.file_name().map_or_else(
        || "vectors".to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    db_path.with_file_name(format!("{}.corrupted-{}", name, stamp))
}

pub(crate) fn folder_predicate(folder: &str) -> String {
    format!("folder = '{}'", folder.replace('\'', "''"))
}

fn progress_bar(len: u64) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len).with_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}")
            .expect("style template is valid"),
    );
    bar.set_message("chunks");
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
