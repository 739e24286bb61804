mod analysis;
mod report;
mod tfqe;

pub use analysis::{
    AnalysisFrame, EntryKind, EntryPoint, IntegratedVerdict, KeyLevels, Momentum, RiskLevel,
    SignalAction, SignalStrength, StrategyRecommendation, StrategyPriority, TrendDirection,
};
pub use report::{
    DataFreshness, MtfSnapshot, MultiTimeframeReport, QuoteBoard, QuoteBoardEntry, TfqeReport,
    TfqeSnapshot,
};
pub use tfqe::{TfqeNoTrend, TfqeOrderPlan, TfqeSignal, TfqeWait, TradeManagement};
