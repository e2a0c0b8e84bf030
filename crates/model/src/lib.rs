// SPDX-License-Identifier: Apache-2.0

//! Shared data model for pipeline events, exactly-once checkpoints, scrape
//! label sets, and control-plane config records.

mod checkpoint;
mod config_info;
mod event;
mod labels;

pub use checkpoint::{FeedbackKey, RangeCheckpoint};
pub use config_info::{ConfigInfo, ConfigStatus};
pub use event::{Event, InputIndex, PipelineEventGroup, ProcessQueueItem};
pub use labels::{
    Labels, LABEL_ADDRESS, LABEL_JOB, LABEL_METRICS_PATH, LABEL_PARAM_PREFIX,
    LABEL_SCHEME, LABEL_SCRAPE_INTERVAL, LABEL_SCRAPE_TIMEOUT,
};
