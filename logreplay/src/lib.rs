#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregator;
pub mod parser;
pub mod queue;
pub mod replay;
pub mod transport;
pub(crate) mod worker;

pub use logreplay_core as core;
pub use replay::{Replay, ReplayError, ReplayState, RunOutcome};

pub mod prelude {
    pub use crate::replay::{Replay, ReplayError, ReplayState, RunOutcome};
    pub use crate::transport::{HttpTransport, RequestError, Transport};

    pub use logreplay_core::{
        ConfigError, ReplayConfig, ReportError, RequestRecord, RunMetrics, RunReport,
    };
}
