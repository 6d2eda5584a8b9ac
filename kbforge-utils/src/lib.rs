//! ABOUTME: Shared utilities with no heavier dependencies than kbforge-core
//! ABOUTME: Identifier sanitization and text helpers

pub mod identifier;
pub mod stopwords;
pub mod tokenize;
