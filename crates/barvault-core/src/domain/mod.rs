//! # Domain Models
//!
//! An instrument moves through the pipeline as three distinct types, so a
//! missing identifier or series cannot be represented:
//!
//! | Type | Has id | Has series | Produced by |
//! |------|--------|------------|-------------|
//! | [`InstrumentSeed`] | no | no | universe loader |
//! | [`ResolvedInstrument`] | yes | no | resolver |
//! | [`Instrument`] | yes | yes | fetcher |
//!
//! [`Bar`] enforces `start < end` and `low <= open, close <= high` at
//! construction time.

mod bar;
mod instrument;
mod timestamp;

pub use bar::Bar;
pub use instrument::{Instrument, InstrumentSeed, ResolvedInstrument, SymbolId};
pub use timestamp::UtcDateTime;
