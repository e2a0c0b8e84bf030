// SPDX-License-Identifier: Apache-2.0

//! Operator-driven scrape scheduler (spec §4.13): per-job target discovery,
//! relabeling, per-target scrape loops, and Prometheus text exposition
//! format parsing.

mod expo_format;
mod job;
mod operator_client;
mod relabel;
mod scheduler;
mod target;
mod work;

pub use expo_format::{parse as parse_exposition_format, Sample};
pub use operator_client::{OperatorClient, TargetGroup};
pub use relabel::apply as apply_relabel_rules;
pub use scheduler::ScrapeScheduler;
pub use target::{build_labels, format_duration_label, initial_offset, resolve_url};
pub use work::ScrapeWork;
