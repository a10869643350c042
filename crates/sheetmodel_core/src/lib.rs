//! Declarative object models with bidirectional relationships,
//! validation and worksheet serialization.
//! This crate is the single source of truth for model invariants.

pub mod attribute;
pub mod codec;
pub mod config;
pub mod invalid;
pub mod logging;
pub mod schema;
pub mod store;
pub mod util;
pub mod validator;
pub mod workbook;

pub use attribute::{Attribute, AttributeKind, Cardinality, Field, Side, Value};
pub use codec::{
    convert, create_template, create_worksheet_style, CodecError, CodecResult, InlineCodec,
    KeyListCodec, LoadedObjects, Reader, Writer,
};
pub use config::{ConfigError, ConfigResult, LoggingConfig, ReaderOptions, SheetModelConfig};
pub use invalid::{InvalidAttribute, InvalidModel, InvalidObject, InvalidObjectSet, InvalidWorksheet};
pub use logging::{default_log_level, init_logging, logging_status};
pub use schema::{Model, ModelDef, ModelId, Orientation, Schema, SchemaBuilder, SchemaError, SchemaResult};
pub use store::{ModelError, ModelResult, ObjectId, RelatedManager, Store};
pub use validator::Validator;
pub use workbook::{Cell, SheetReader, SheetWriter, Workbook, WorkbookError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
