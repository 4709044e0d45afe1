/// Data layer: core types, loading, filtering, aggregation and export.
///
/// Architecture:
/// ```text
///  .csv / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse + validate rows → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, option lists, date span (shared via Arc)
///   └──────────┘
///        │   + FilterState
///        ▼
///   ┌──────────┐
///   │  filter   │  date + categorical predicates → FilteredView
///   └──────────┘
///        │
///        ├──────────────┬──────────────┐
///        ▼              ▼              ▼
///   ┌──────────┐  ┌──────────┐  ┌──────────┐
///   │ aggregate │  │ ranking  │  │  export   │  KPIs / top-N / CSV + XLSX
///   └──────────┘  └──────────┘  └──────────┘
/// ```

pub mod aggregate;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod ranking;
