//! Ready-made callables for conduit pipelines.
//!
//! Every type here implements one of the callable contracts of
//! `conduit-core` and can be used directly in a `PipelineSpec` or
//! registered by name for configuration-driven pipelines.

pub mod batch;
pub mod filter;
pub mod partition;
pub mod transform;

pub use batch::DedupBy;
pub use filter::FieldFilter;
pub use partition::FieldKey;
pub use transform::{DropFields, Duplicate, RenameField, SetField};

use conduit_core::{MapOutput, MapperFn, ProcessingContext, Record, Registry, ERROR_FIELD};

/// Registers the parameterless built-ins under their default names:
///
/// | Name            | Kind          | Callable                    |
/// |-----------------|---------------|-----------------------------|
/// | `has_id`        | filter        | `FieldFilter::exists("id")` |
/// | `identity`      | mapper        | returns the record unchanged |
/// | `duplicate`     | mapper        | `Duplicate { copies: 2 }`   |
/// | `strip_error`   | mapper        | drops the `_error` field    |
/// | `dedup_by_id`   | batch mapper  | `DedupBy::new("id")`        |
/// | `by_id`         | partition key | `FieldKey::new("id")`       |
pub fn register_builtins(registry: &mut Registry) -> &mut Registry {
    registry
        .register_filter("has_id", FieldFilter::exists("id"))
        .register_mapper(
            "identity",
            MapperFn::new(|record: Record, _: &ProcessingContext| Ok(MapOutput::One(record))),
        )
        .register_mapper("duplicate", Duplicate { copies: 2 })
        .register_mapper("strip_error", DropFields::new([ERROR_FIELD]))
        .register_batch_mapper("dedup_by_id", DedupBy::new("id"))
        .register_partition_key("by_id", FieldKey::new("id"))
}
