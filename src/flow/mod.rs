//! 自评估研究流程：prompt 工程 → 研究 → 评审，有界重试

pub mod research;
pub mod researcher;
pub mod state;

pub use research::{FlowOutcome, FlowSettings, ResearchCrews, ResearchFlow, RESEARCH_NOT_COMPLETED};
pub use researcher::{CrewRole, ResearchRun, ResearchService};
pub use state::{FlowStatus, ResearchState};
