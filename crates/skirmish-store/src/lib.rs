//! `PostgreSQL` persistence for combat encounter documents.

pub mod pg_document_repository;
pub mod schema;
