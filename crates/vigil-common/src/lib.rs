//! Vocabulary shared by the storage layer and the API server: severities,
//! notification method kinds, action-list kinds, request payloads, id
//! generation and the alarm threshold-expression grammar.

pub mod expression;
pub mod id;
pub mod types;
