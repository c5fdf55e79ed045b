//! Search engine facade: one named tantivy index per domain.
//!
//! The facade exposes index/delete/search/reindex-all/document-count and
//! performs no cross-call locking of its own beyond serializing writes to a
//! single domain's writer; the domain stores hold their own lock around the
//! load and mutation paths.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    collector::TopDocs,
    query::{
        AllQuery,
        BooleanQuery,
        BoostQuery,
        FuzzyTermQuery,
        Occur,
        Query,
        QueryParser,
        RegexQuery,
        TermQuery,
    },
    schema::{
        Field,
        IndexRecordOption,
        STORED,
        STRING,
        Schema,
        TextFieldIndexing,
        TextOptions,
        Value,
    },
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    domain::Domain,
    error::{Error, Result},
    workspace::Workspace,
};

const WRITER_MEMORY: usize = 15_000_000;

/// Field names shared by every domain index.
pub mod fields {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const LABEL: &str = "label";
}

/// Resolved field handles for the shared schema.
#[derive(Clone, Copy)]
struct SchemaFields {
    id: Field,
    title: Field,
    body: Field,
    label: Field,
}

/// A document handed to the facade for indexing. `labels` are exact-match
/// `key:value` facets used by filtered searches.
#[derive(Debug, Clone, Default)]
pub struct IndexDoc {
    pub id: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<(String, String)>,
}

impl IndexDoc {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn label(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }
}

/// A ranked search hit. Stores resolve the id back to the full record.
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub score: f32,
    pub title: String,
}

struct DomainIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
}

/// Manages the per-domain tantivy indexes.
pub struct SearchEngine {
    fields: SchemaFields,
    indexes: HashMap<Domain, DomainIndex>,
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let id = builder.add_text_field(fields::ID, STRING | STORED);

    let title_opts = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("en_stem")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    let title = builder.add_text_field(fields::TITLE, title_opts);

    let body_opts = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("en_stem")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions),
    );
    let body = builder.add_text_field(fields::BODY, body_opts);

    let label = builder.add_text_field(fields::LABEL, STRING | STORED);

    (builder.build(), SchemaFields {
        id,
        title,
        body,
        label,
    })
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl SearchEngine {
    /// Open or create one on-disk index per domain under the workspace's
    /// `indexes/` directory.
    pub fn open(workspace: &Workspace) -> Result<Self> {
        let (schema, fields) = build_schema();
        let mut indexes = HashMap::new();

        for domain in Domain::ALL {
            let dir = workspace.index_dir(domain);
            std::fs::create_dir_all(&dir)?;

            let mmap_dir = tantivy::directory::MmapDirectory::open(&dir)
                .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
            let index = if Index::exists(&mmap_dir)
                .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
            {
                Index::open(mmap_dir)?
            } else {
                Index::create(
                    mmap_dir,
                    schema.clone(),
                    tantivy::IndexSettings::default(),
                )?
            };

            indexes.insert(domain, Self::make_handle(index)?);
        }

        Ok(Self { fields, indexes })
    }

    /// Create in-memory indexes for every domain (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::open_in_ram_subset(&Domain::ALL)
    }

    /// Create in-memory indexes for a subset of domains (for testing the
    /// domain-not-found behavior).
    pub fn open_in_ram_subset(domains: &[Domain]) -> Result<Self> {
        let (schema, fields) = build_schema();
        let mut indexes = HashMap::new();

        for domain in domains {
            let index = Index::create_in_ram(schema.clone());
            indexes.insert(*domain, Self::make_handle(index)?);
        }

        Ok(Self { fields, indexes })
    }

    fn make_handle(index: Index) -> Result<DomainIndex> {
        register_tokenizers(&index);
        let reader = index.reader()?;
        let writer = Mutex::new(index.writer(WRITER_MEMORY)?);
        Ok(DomainIndex {
            index,
            reader,
            writer,
        })
    }

    fn handle(&self, domain: Domain) -> Result<&DomainIndex> {
        self.indexes
            .get(&domain)
            .ok_or(Error::DomainNotFound(domain))
    }

    /// Insert or overwrite a document under its id. Idempotent: indexing the
    /// same id twice leaves a single copy.
    pub fn index(&self, domain: Domain, doc: &IndexDoc) -> Result<()> {
        let handle = self.handle(domain)?;
        let f = self.fields;
        let mut writer = lock_writer(handle);

        let term = tantivy::Term::from_field_text(f.id, &doc.id);
        writer.delete_term(term);

        let mut document = TantivyDocument::new();
        document.add_text(f.id, &doc.id);
        document.add_text(f.title, &doc.title);
        document.add_text(f.body, &doc.body);
        for (key, value) in &doc.labels {
            document.add_text(f.label, format!("{key}:{value}"));
        }
        writer.add_document(document)?;
        writer.commit()?;

        Ok(())
    }

    /// Remove a document by id; a no-op if absent.
    pub fn delete(&self, domain: Domain, id: &str) -> Result<()> {
        let handle = self.handle(domain)?;
        let mut writer = lock_writer(handle);
        writer.delete_term(tantivy::Term::from_field_text(self.fields.id, id));
        writer.commit()?;
        Ok(())
    }

    /// Reset the domain's index to empty. Used as the first step of a domain
    /// store load, before the freshly parsed records are re-indexed.
    pub fn reindex_all(&self, domain: Domain) -> Result<()> {
        let handle = self.handle(domain)?;
        let mut writer = lock_writer(handle);
        writer.delete_all_documents()?;
        writer.commit()?;
        Ok(())
    }

    /// Number of documents currently in the domain's index.
    pub fn document_count(&self, domain: Domain) -> Result<u64> {
        let handle = self.handle(domain)?;
        handle.reader.reload()?;
        Ok(handle.reader.searcher().num_docs())
    }

    /// Ranked full-text search. An empty or `*` query matches everything.
    pub fn search(
        &self,
        domain: Domain,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        self.search_with_filters(domain, query_str, &[], limit)
    }

    /// Ranked full-text search with exact-match label filters applied as a
    /// conjunction on top of the text query.
    pub fn search_with_filters(
        &self,
        domain: Domain,
        query_str: &str,
        filters: &[(String, String)],
        limit: usize,
    ) -> Result<Vec<Hit>> {
        let handle = self.handle(domain)?;
        let f = self.fields;
        handle.reader.reload()?;
        let searcher = handle.reader.searcher();

        let text_query = self.build_text_query(handle, query_str);

        let query: Box<dyn Query> = if filters.is_empty() {
            text_query
        } else {
            let mut clauses: Vec<(Occur, Box<dyn Query>)> =
                vec![(Occur::Must, text_query)];
            for (key, value) in filters {
                let term = tantivy::Term::from_field_text(
                    f.label,
                    &format!("{key}:{value}"),
                );
                clauses.push((
                    Occur::Must,
                    Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
                ));
            }
            Box::new(BooleanQuery::new(clauses))
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(Hit {
                score,
                id: extract_text(&doc, f.id),
                title: extract_text(&doc, f.title),
            });
        }

        Ok(hits)
    }

    /// Combine fuzzy, exact, prefix and substring matching, with exact
    /// matches weighted highest so precision wins while typos still land.
    fn build_text_query(
        &self,
        handle: &DomainIndex,
        query_str: &str,
    ) -> Box<dyn Query> {
        let trimmed = query_str.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Box::new(AllQuery);
        }

        let f = self.fields;
        let mut parser =
            QueryParser::for_index(&handle.index, vec![f.title, f.body]);
        parser.set_field_boost(f.title, 2.0);
        let (parsed, _errors) = parser.parse_query_lenient(trimmed);

        let mut clauses: Vec<(Occur, Box<dyn Query>)> =
            vec![(Occur::Should, Box::new(BoostQuery::new(parsed, 2.0)))];

        for term_str in trimmed.split_whitespace() {
            if term_str.len() < 3 {
                continue;
            }
            let lower = term_str.to_lowercase();
            let term = tantivy::Term::from_field_text(f.body, &lower);

            clauses.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(term.clone(), 2, true)),
            ));
            clauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(
                    Box::new(FuzzyTermQuery::new_prefix(term, 0, true)),
                    1.5,
                )),
            ));
            if let Ok(substring) = RegexQuery::from_pattern(
                &format!(".*{}.*", regex::escape(&lower)),
                f.body,
            ) {
                clauses.push((Occur::Should, Box::new(substring)));
            }
        }

        Box::new(BooleanQuery::new(clauses))
    }
}

fn lock_writer(handle: &DomainIndex) -> std::sync::MutexGuard<'_, IndexWriter> {
    handle.writer.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("domains", &self.indexes.len())
            .finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
