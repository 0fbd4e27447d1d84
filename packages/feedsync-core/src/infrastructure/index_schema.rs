//! Tantivy schema of the search index
//!
//! 1. `object_id` - ObjectId (STORED, keyword) - delete/upsert term
//! 2. `codename` - root codename (STORED, keyword)
//! 3. `language` - root language (STORED, keyword)
//! 4. `block_codename` - one value per content block (keyword) - owner lookup
//! 5. `name` - display name (STORED, indexed)
//! 6. `slug` - public location (STORED)
//! 7. `contents` - block text (indexed)
//! 8. `payload` - full document as JSON (STORED)
//! 9. `indexed_at` - indexing timestamp (STORED, date)

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, TEXT,
};

pub const FIELD_OBJECT_ID: &str = "object_id";
pub const FIELD_CODENAME: &str = "codename";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_BLOCK_CODENAME: &str = "block_codename";
pub const FIELD_NAME: &str = "name";
pub const FIELD_SLUG: &str = "slug";
pub const FIELD_CONTENTS: &str = "contents";
pub const FIELD_PAYLOAD: &str = "payload";
pub const FIELD_INDEXED_AT: &str = "indexed_at";

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    // exact-match keywords
    let keyword = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    );
    let stored_keyword = keyword.clone().set_stored();

    schema_builder.add_text_field(FIELD_OBJECT_ID, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_CODENAME, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_LANGUAGE, stored_keyword);
    schema_builder.add_text_field(FIELD_BLOCK_CODENAME, keyword);

    schema_builder.add_text_field(FIELD_NAME, TEXT | STORED);
    schema_builder.add_text_field(FIELD_SLUG, STORED);
    schema_builder.add_text_field(FIELD_CONTENTS, TEXT);
    schema_builder.add_text_field(FIELD_PAYLOAD, STORED);

    schema_builder.add_date_field(FIELD_INDEXED_AT, STORED);

    schema_builder.build()
}

/// Field handles
#[derive(Debug, Clone)]
pub struct SchemaFields {
    pub schema: Schema,
    pub object_id: Field,
    pub codename: Field,
    pub language: Field,
    pub block_codename: Field,
    pub name: Field,
    pub slug: Field,
    pub contents: Field,
    pub payload: Field,
    pub indexed_at: Field,
}

impl SchemaFields {
    /// Resolve handles against `schema`; fails if a field is missing
    /// (e.g. an index created by an incompatible build).
    pub fn from_schema(schema: Schema) -> tantivy::Result<Self> {
        Ok(Self {
            object_id: schema.get_field(FIELD_OBJECT_ID)?,
            codename: schema.get_field(FIELD_CODENAME)?,
            language: schema.get_field(FIELD_LANGUAGE)?,
            block_codename: schema.get_field(FIELD_BLOCK_CODENAME)?,
            name: schema.get_field(FIELD_NAME)?,
            slug: schema.get_field(FIELD_SLUG)?,
            contents: schema.get_field(FIELD_CONTENTS)?,
            payload: schema.get_field(FIELD_PAYLOAD)?,
            indexed_at: schema.get_field(FIELD_INDEXED_AT)?,
            schema,
        })
    }
}
