//! The analysis data model (§3).
//!
//! Every type here is a plain, serializable value; the components in
//! [`crate::loader`], [`crate::stats`], [`crate::geo`], [`crate::detectors`],
//! [`crate::voip`], [`crate::orchestrator`], and [`crate::report`] build and
//! consume these values but never redefine their shape.

pub mod cache_key;
pub mod finding;
pub mod packet;
pub mod progress;
pub mod result;
pub mod stats;
pub mod threat;
pub mod voip;

pub use cache_key::{FindingKey, PlanKey, digest_inputs};
pub use finding::{
    RemediationPhase, RemediationPlan, RemediationPriority, RemediationTask, SecurityFinding,
};
pub use packet::{PacketRecord, ProtocolTag, TcpFlags};
pub use progress::{Phase, ProgressEvent, SubPhase};
pub use result::{AnalysisResult, FileMetadata};
pub use stats::{
    ConversationStat, CountryTraffic, CrossBorderFlow, EndpointStat, NetworkStatistics, PortStat,
    ProtocolStats, ServiceStat, TimeSeriesPoint,
};
pub use threat::{NetworkAnomaly, SecurityThreat, Severity, anomaly_to_threat};
pub use voip::{
    FlowKey4, PercentileSummary, VoiceQoSFlow, VoiceQoSResult, VoiceQoSTimeSeries,
    VoiceQoSTimeSeriesPoint,
};
