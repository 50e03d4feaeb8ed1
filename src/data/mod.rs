/// Data layer: core types, loading, and grouping.
///
/// Architecture:
/// ```text
///  .parquet / .csv / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpatialDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ SpatialDataset │  ExpressionMatrix + observation metadata
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ grouping  │  sample column → ordered observation groups
///   └──────────┘
/// ```

pub mod grouping;
pub mod loader;
pub mod model;
