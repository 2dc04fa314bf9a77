//! 图表同步核心：历史加载、实时合并、标注去重、云图投影与图例解析

pub mod cloud;
pub mod context;
pub mod legend;
pub mod markers;
pub mod registry;
pub mod snapshot;
pub mod tick;
pub mod time_key;

pub use cloud::CloudProjector;
pub use context::{ChartContext, SessionStats, ViewCommand};
pub use legend::{LegendContext, LegendField, LegendSource, LegendValue, PointerState, RenderedLegend};
pub use markers::MarkerLedger;
pub use registry::{ChartSnapshot, SeriesDelta, SeriesRegistry, Upsert};
pub use snapshot::LoadReport;
pub use tick::{DropReason, TickOutcome};
